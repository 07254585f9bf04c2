//! Persistence for current asset state, price history, the watchlist and
//! notification subscribers.

pub mod db;
pub mod error;
pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod schema;
pub mod watchlist;

pub use error::StoreError;
pub use model::{HistoryPoint, StoredAsset, Subscriber, TrackedAsset};
pub use repository::{HistoryStore, StateStore, SubscriberRegistry};
pub use repository_sqlx::SqlxRepository;
pub use watchlist::{TrackOutcome, WatchlistService};
