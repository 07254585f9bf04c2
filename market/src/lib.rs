//! Upstream market data: the feed capability, its CoinGecko implementation,
//! and the read-through caches request handlers serve from.

pub mod cache;
pub mod coingecko;
pub mod errors;
pub mod feed;
pub mod types;

pub use cache::{
    CacheEntry, DetailCache, DetailCacheConfig, Snapshot, SnapshotCache, SnapshotCacheConfig,
};
pub use errors::MarketError;
pub use feed::MarketFeed;
pub use types::{AssetDetail, AssetSnapshot, RawAssetDetail};
