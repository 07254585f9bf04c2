use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::MarketError;
use crate::types::{AssetSnapshot, RawAssetDetail};

/// Read access to the upstream market-data provider.
///
/// Implementations classify their own failures into [`MarketError`].
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Full asset listing. `sparkline` asks for the 7d price series as well.
    async fn fetch_market_snapshot(&self, sparkline: bool)
    -> Result<Vec<AssetSnapshot>, MarketError>;

    async fn fetch_asset_detail(&self, asset_id: &str) -> Result<RawAssetDetail, MarketError>;

    /// Lightweight spot price lookup. `Ok(None)` means the provider had no
    /// price for the asset.
    async fn fetch_current_price(&self, asset_id: &str) -> Result<Option<Decimal>, MarketError>;
}

/// Runs an upstream call under `limit`; an elapsed deadline becomes
/// [`MarketError::UpstreamUnavailable`].
pub async fn with_deadline<T, F>(what: &str, limit: Duration, fut: F) -> Result<T, MarketError>
where
    F: Future<Output = Result<T, MarketError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(MarketError::timeout(what, limit)),
    }
}
