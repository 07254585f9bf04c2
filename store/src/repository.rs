use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use market::AssetSnapshot;

use crate::error::StoreError;
use crate::model::{HistoryPoint, StoredAsset, Subscriber, TrackedAsset};

/// Current asset state and the watchlist.
///
/// Every write is a single-row statement, so concurrent writers to
/// different rows never block each other and writes to the same row are
/// serialised by the engine.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Insert, or overwrite price/change/rank and stamp `updated_at = at`.
    async fn upsert_asset(&self, asset: &AssetSnapshot, at: DateTime<Utc>)
    -> Result<(), StoreError>;

    async fn get_all_assets(&self) -> Result<Vec<StoredAsset>, StoreError>;

    async fn get_asset(&self, asset_id: &str) -> Result<Option<StoredAsset>, StoreError>;

    /// Watchlist, most recently tracked first.
    async fn get_tracked(&self) -> Result<Vec<TrackedAsset>, StoreError>;

    /// Insert-or-ignore on `asset_id`. Returns `true` if a row was created.
    async fn upsert_tracked(&self, tracked: &TrackedAsset) -> Result<bool, StoreError>;

    /// Returns `true` if a row was removed.
    async fn delete_tracked(&self, asset_id: &str) -> Result<bool, StoreError>;

    async fn update_last_alerted_price(
        &self,
        asset_id: &str,
        price: Decimal,
    ) -> Result<(), StoreError>;

    /// Points every tracked asset without a subscriber at `address`.
    /// Returns how many rows were claimed.
    async fn assign_unclaimed_tracked(&self, address: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, point: &HistoryPoint) -> Result<(), StoreError>;

    /// The newest `limit` points for `asset_id`, returned oldest first.
    async fn get_recent(&self, asset_id: &str, limit: usize)
    -> Result<Vec<HistoryPoint>, StoreError>;
}

#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    /// Records `address`; registering again refreshes its registration time.
    async fn register(&self, address: &str) -> Result<(), StoreError>;

    async fn has_subscriber(&self) -> Result<bool, StoreError>;

    async fn latest_subscriber(&self) -> Result<Option<Subscriber>, StoreError>;
}
