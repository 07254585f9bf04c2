use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::entry::CacheEntry;
use crate::errors::MarketError;
use crate::feed::{MarketFeed, with_deadline};
use crate::types::AssetDetail;

#[derive(Debug, Clone)]
pub struct DetailCacheConfig {
    pub ttl: Duration,
    pub fetch_timeout: Duration,
}

impl Default for DetailCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-asset cache of normalised detail records.
///
/// Entries are never evicted; an expired entry is only replaced by a
/// successful fetch and is served as-is when the upstream fails. Refreshes
/// for the same key are serialised so concurrent misses cost one fetch.
pub struct DetailCache {
    feed: Arc<dyn MarketFeed>,
    cfg: DetailCacheConfig,

    entries: RwLock<HashMap<String, CacheEntry<AssetDetail>>>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DetailCache {
    pub fn new(feed: Arc<dyn MarketFeed>, cfg: DetailCacheConfig) -> Self {
        Self {
            feed,
            cfg,
            entries: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self), target = "cache", fields(asset_id = %asset_id))]
    pub async fn get_detail(&self, asset_id: &str) -> Result<AssetDetail, MarketError> {
        if let Some(hit) = self.fresh(asset_id) {
            debug!("serving detail from cache");
            return Ok(hit);
        }

        let key_lock = self.key_lock(asset_id);
        let _guard = key_lock.lock().await;

        // Filled by the caller we were queued behind.
        if let Some(hit) = self.fresh(asset_id) {
            return Ok(hit);
        }

        let outcome = with_deadline(
            "asset detail fetch",
            self.cfg.fetch_timeout,
            self.feed.fetch_asset_detail(asset_id),
        )
        .await;

        match outcome {
            Ok(raw) => {
                let detail = AssetDetail::from_raw(asset_id, raw);
                self.entries
                    .write()
                    .insert(asset_id.to_string(), CacheEntry::new(detail.clone()));

                info!("asset detail refreshed");
                Ok(detail)
            }
            Err(e) => {
                let cached = self
                    .entries
                    .read()
                    .get(asset_id)
                    .map(|c| (c.value.clone(), c.age()));

                match cached {
                    Some((stale, age)) => {
                        warn!(
                            error = %e,
                            age_secs = age.as_secs(),
                            stale = true,
                            "detail refresh failed; serving cached copy"
                        );
                        Ok(stale)
                    }
                    None => {
                        warn!(error = %e, "detail refresh failed and nothing is cached");
                        self.release_lock(asset_id, &key_lock);
                        Err(MarketError::DetailUnavailable {
                            asset_id: asset_id.to_string(),
                            reason: e.to_string(),
                        })
                    }
                }
            }
        }
    }

    /// Number of assets with a cached detail, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn fresh(&self, asset_id: &str) -> Option<AssetDetail> {
        self.entries
            .read()
            .get(asset_id)
            .filter(|e| e.is_fresh(self.cfg.ttl))
            .map(|e| e.value.clone())
    }

    fn key_lock(&self, asset_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock();
        Arc::clone(locks.entry(asset_id.to_string()).or_default())
    }

    /// Forgets the lock of a key that has no cached entry, unless another
    /// caller is queued on it. Unknown ids then leave nothing behind.
    fn release_lock(&self, asset_id: &str, held: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.key_locks.lock();
        // one reference in the map, one held by the caller
        if Arc::strong_count(held) == 2 && !self.entries.read().contains_key(asset_id) {
            locks.remove(asset_id);
        }
    }
}
