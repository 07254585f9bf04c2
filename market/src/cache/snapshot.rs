use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::entry::CacheEntry;
use crate::errors::MarketError;
use crate::feed::{MarketFeed, with_deadline};
use crate::types::AssetSnapshot;

/// Shared, immutable view of one market fetch.
pub type Snapshot = Arc<Vec<AssetSnapshot>>;

#[derive(Debug, Clone)]
pub struct SnapshotCacheConfig {
    /// Maximum age at which the snapshot is served without refetching.
    pub ttl: Duration,
    /// Upper bound for a single upstream fetch.
    pub fetch_timeout: Duration,
}

impl Default for SnapshotCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Read-through cache for the full market listing.
///
/// Refreshes are single-flight: callers that arrive while a refresh is
/// running wait for it and take its outcome (fresh value, stale fallback or
/// error) instead of issuing their own fetch.
pub struct SnapshotCache {
    feed: Arc<dyn MarketFeed>,
    cfg: SnapshotCacheConfig,

    entry: RwLock<Option<CacheEntry<Snapshot>>>,
    last_error: RwLock<Option<MarketError>>,

    /// Held for the duration of an upstream fetch.
    refresh: Mutex<()>,
    /// Bumped once per completed refresh attempt, success or not.
    refresh_cycles: AtomicU64,
}

impl SnapshotCache {
    pub fn new(feed: Arc<dyn MarketFeed>, cfg: SnapshotCacheConfig) -> Self {
        Self {
            feed,
            cfg,
            entry: RwLock::new(None),
            last_error: RwLock::new(None),
            refresh: Mutex::new(()),
            refresh_cycles: AtomicU64::new(0),
        }
    }

    #[instrument(skip(self), target = "cache")]
    pub async fn get_snapshot(&self) -> Result<Snapshot, MarketError> {
        // Read before the freshness check so a refresh that completes in
        // between is always observed below.
        let seen_cycle = self.refresh_cycles.load(Ordering::Acquire);

        if let Some(hit) = self.fresh() {
            debug!(assets = hit.len(), "serving snapshot from cache");
            return Ok(hit);
        }

        let _guard = self.refresh.lock().await;

        if self.refresh_cycles.load(Ordering::Acquire) != seen_cycle {
            // Someone else completed the refresh we queued behind.
            return self.settled();
        }

        if let Some(hit) = self.fresh() {
            return Ok(hit);
        }

        let outcome = with_deadline(
            "market snapshot fetch",
            self.cfg.fetch_timeout,
            self.feed.fetch_market_snapshot(true),
        )
        .await;

        let result = match outcome {
            Ok(assets) => {
                let snapshot: Snapshot = Arc::new(assets);
                *self.entry.write() = Some(CacheEntry::new(Arc::clone(&snapshot)));
                *self.last_error.write() = None;

                info!(assets = snapshot.len(), "market snapshot refreshed");
                Ok(snapshot)
            }
            Err(e) => {
                *self.last_error.write() = Some(e.clone());
                self.stale_or(e)
            }
        };

        self.refresh_cycles.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// Age of the held snapshot, fresh or not.
    pub fn age(&self) -> Option<Duration> {
        self.entry.read().as_ref().map(CacheEntry::age)
    }

    fn fresh(&self) -> Option<Snapshot> {
        self.entry
            .read()
            .as_ref()
            .filter(|e| e.is_fresh(self.cfg.ttl))
            .map(|e| Arc::clone(&e.value))
    }

    /// Outcome of the refresh that just finished under another caller.
    fn settled(&self) -> Result<Snapshot, MarketError> {
        if let Some(e) = self.entry.read().as_ref() {
            return Ok(Arc::clone(&e.value));
        }

        Err(self.last_error.read().clone().unwrap_or_else(|| {
            MarketError::UpstreamUnavailable("snapshot refresh failed".to_string())
        }))
    }

    fn stale_or(&self, err: MarketError) -> Result<Snapshot, MarketError> {
        match self.entry.read().as_ref() {
            Some(stale) => {
                warn!(
                    error = %err,
                    age_secs = stale.age().as_secs(),
                    "snapshot refresh failed; serving stale snapshot"
                );
                Ok(Arc::clone(&stale.value))
            }
            None => {
                error!(error = %err, "snapshot refresh failed and nothing is cached");
                Err(err)
            }
        }
    }
}
