//! Where the alert job reads "current price" from.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use market::feed::with_deadline;
use market::{MarketError, MarketFeed};
use store::{StateStore, StoreError};

#[derive(Debug, Error)]
pub enum PriceError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Current price lookup for a single asset. `Ok(None)` means no price is
/// known right now.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_price(&self, asset_id: &str) -> Result<Option<Decimal>, PriceError>;
}

/// Asks the upstream provider directly, one lightweight call per asset.
pub struct FeedPriceSource {
    feed: Arc<dyn MarketFeed>,
    timeout: Duration,
}

impl FeedPriceSource {
    pub fn new(feed: Arc<dyn MarketFeed>, timeout: Duration) -> Self {
        Self { feed, timeout }
    }
}

#[async_trait]
impl PriceSource for FeedPriceSource {
    async fn current_price(&self, asset_id: &str) -> Result<Option<Decimal>, PriceError> {
        let price = with_deadline(
            "current price",
            self.timeout,
            self.feed.fetch_current_price(asset_id),
        )
        .await?;

        Ok(price)
    }
}

/// Reads the row the ingestion job last wrote. No upstream traffic, but the
/// price is only as fresh as the last ingestion cycle.
pub struct StatePriceSource {
    state: Arc<dyn StateStore>,
}

impl StatePriceSource {
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl PriceSource for StatePriceSource {
    async fn current_price(&self, asset_id: &str) -> Result<Option<Decimal>, PriceError> {
        Ok(self
            .state
            .get_asset(asset_id)
            .await?
            .map(|a| a.current_price))
    }
}

/// Configured choice of [`PriceSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriceSourceKind {
    #[default]
    Upstream,
    State,
}

impl FromStr for PriceSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upstream" => Ok(Self::Upstream),
            "state" => Ok(Self::State),
            other => Err(format!("unknown price source '{other}'")),
        }
    }
}

impl fmt::Display for PriceSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream => f.write_str("upstream"),
            Self::State => f.write_str("state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_price_source_names() {
        assert_eq!("upstream".parse::<PriceSourceKind>(), Ok(PriceSourceKind::Upstream));
        assert_eq!(" STATE ".parse::<PriceSourceKind>(), Ok(PriceSourceKind::State));
        assert!("redis".parse::<PriceSourceKind>().is_err());
    }
}
