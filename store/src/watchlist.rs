use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::StoreError;
use crate::model::TrackedAsset;
use crate::repository::{StateStore, SubscriberRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Tracked,
    AlreadyTracked,
}

/// Watchlist operations exposed to request handlers.
///
/// New tracks are addressed to the most recently registered subscriber;
/// each tracked row then keeps its own address.
pub struct WatchlistService {
    state: Arc<dyn StateStore>,
    subscribers: Arc<dyn SubscriberRegistry>,
}

impl WatchlistService {
    pub fn new(state: Arc<dyn StateStore>, subscribers: Arc<dyn SubscriberRegistry>) -> Self {
        Self { state, subscribers }
    }

    /// Adds an asset to the watchlist. Fails with [`StoreError::NoSubscriber`]
    /// until someone has registered for notifications.
    #[instrument(skip(self, display_name, symbol), fields(asset_id = %asset_id))]
    pub async fn track(
        &self,
        asset_id: &str,
        display_name: &str,
        symbol: &str,
    ) -> Result<TrackOutcome, StoreError> {
        let subscriber = self
            .subscribers
            .latest_subscriber()
            .await?
            .ok_or(StoreError::NoSubscriber)?;

        let row = TrackedAsset::new(asset_id, display_name, symbol, Some(subscriber.address));

        if self.state.upsert_tracked(&row).await? {
            info!("asset tracked");
            Ok(TrackOutcome::Tracked)
        } else {
            Ok(TrackOutcome::AlreadyTracked)
        }
    }

    /// Returns `false` if the asset was not tracked.
    #[instrument(skip(self))]
    pub async fn untrack(&self, asset_id: &str) -> Result<bool, StoreError> {
        let removed = self.state.delete_tracked(asset_id).await?;
        if removed {
            info!("asset untracked");
        }
        Ok(removed)
    }

    pub async fn tracked(&self) -> Result<Vec<TrackedAsset>, StoreError> {
        self.state.get_tracked().await
    }

    /// Records a notification target and hands it every tracked asset that
    /// has none yet. Returns the number of assets claimed.
    #[instrument(skip(self))]
    pub async fn register_subscriber(&self, address: &str) -> Result<u64, StoreError> {
        self.subscribers.register(address).await?;
        let claimed = self.state.assign_unclaimed_tracked(address).await?;

        info!(claimed, "subscriber registered");
        Ok(claimed)
    }

    pub async fn subscriber_connected(&self) -> Result<bool, StoreError> {
        self.subscribers.has_subscriber().await
    }
}
