//! Background jobs: market ingestion and price-move alerts, plus the
//! notification queue alerts are dispatched through.

pub mod alerts;
pub mod ingestion;
pub mod notify;
pub mod price_source;
pub mod runner;
pub mod types;

pub use alerts::{AlertLoop, Direction, PriceAlert, delta_pct};
pub use ingestion::IngestionLoop;
pub use notify::{NotificationQueue, Notifier, spawn_dispatcher};
pub use price_source::{FeedPriceSource, PriceSource, PriceSourceKind, StatePriceSource};
pub use runner::{PeriodicJob, spawn_periodic};
pub use types::{AlertConfig, AlertReport, IngestionConfig, IngestionReport};
