use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, instrument};

use super::errors::GeckoError;
use super::types::{parse_markets, parse_simple_price};
use crate::errors::MarketError;
use crate::feed::MarketFeed;
use crate::types::{AssetSnapshot, RawAssetDetail};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Clone)]
pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
}

impl CoinGeckoClient {
    /// `timeout` bounds every request end to end.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeckoError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(concat!("market-pulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Appends `segments` to the base url, percent-encoding each one so a
    /// caller-supplied id stays a single path segment.
    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, GeckoError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GeckoError::InvalidBaseUrl(format!("{}: {e}", self.base_url)))?;

        url.path_segments_mut()
            .map_err(|_| GeckoError::InvalidBaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    async fn get_json(
        &self,
        endpoint: &'static str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Value, GeckoError> {
        let url = self.endpoint_url(segments)?;

        let resp = self.http.get(url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeckoError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn markets(&self, sparkline: bool) -> Result<Vec<AssetSnapshot>, GeckoError> {
        let body = self
            .get_json(
                "coins/markets",
                &["coins", "markets"],
                &[
                    ("vs_currency", "usd"),
                    ("sparkline", if sparkline { "true" } else { "false" }),
                ],
            )
            .await?;

        let assets = parse_markets(body)?;
        debug!(assets = assets.len(), "coingecko markets fetched");

        Ok(assets)
    }

    #[instrument(skip(self), fields(asset_id = %asset_id), level = "debug")]
    pub async fn coin(&self, asset_id: &str) -> Result<RawAssetDetail, GeckoError> {
        let body = self
            .get_json(
                "coins/{id}",
                &["coins", asset_id],
                &[
                    ("localization", "false"),
                    ("tickers", "false"),
                    ("market_data", "false"),
                    ("community_data", "false"),
                    ("developer_data", "false"),
                ],
            )
            .await?;

        if !body.is_object() {
            return Err(GeckoError::InvalidResponse(format!(
                "expected object for coin {asset_id}"
            )));
        }

        Ok(serde_json::from_value(body)?)
    }

    #[instrument(skip(self), fields(asset_id = %asset_id), level = "debug")]
    pub async fn simple_price(&self, asset_id: &str) -> Result<Option<Decimal>, GeckoError> {
        let body = self
            .get_json(
                "simple/price",
                &["simple", "price"],
                &[("ids", asset_id), ("vs_currencies", "usd")],
            )
            .await?;

        let price = parse_simple_price(&body, asset_id);
        debug!(price = ?price, "coingecko spot price fetched");

        Ok(price)
    }
}

#[async_trait]
impl MarketFeed for CoinGeckoClient {
    async fn fetch_market_snapshot(
        &self,
        sparkline: bool,
    ) -> Result<Vec<AssetSnapshot>, MarketError> {
        Ok(self.markets(sparkline).await?)
    }

    async fn fetch_asset_detail(&self, asset_id: &str) -> Result<RawAssetDetail, MarketError> {
        Ok(self.coin(asset_id).await?)
    }

    async fn fetch_current_price(&self, asset_id: &str) -> Result<Option<Decimal>, MarketError> {
        Ok(self.simple_price(asset_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let client = CoinGeckoClient::new("http://localhost:9/api/v3/", Duration::from_secs(1))
            .unwrap();

        assert_eq!(client.base_url, "http://localhost:9/api/v3");
    }

    #[test]
    fn asset_id_is_encoded_as_one_path_segment() {
        let client =
            CoinGeckoClient::new("https://api.coingecko.com/api/v3", Duration::from_secs(1)).unwrap();

        let url = client.endpoint_url(&["coins", "../simple/price?ids=x"]).unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.coingecko.com/api/v3/coins/..%2Fsimple%2Fprice%3Fids=x"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn plain_ids_are_left_alone() {
        let client = CoinGeckoClient::new("http://localhost:9/api/v3/", Duration::from_secs(1))
            .unwrap();

        let url = client.endpoint_url(&["coins", "wrapped-bitcoin"]).unwrap();

        assert_eq!(url.as_str(), "http://localhost:9/api/v3/coins/wrapped-bitcoin");
    }

    #[tokio::test]
    async fn malformed_base_url_is_upstream_unavailable() {
        let client = CoinGeckoClient::new("not a url", Duration::from_secs(1)).unwrap();

        let err = client.fetch_asset_detail("bitcoin").await.unwrap_err();
        assert!(matches!(err, MarketError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_upstream_unavailable() {
        let client =
            CoinGeckoClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();

        let err = client.fetch_current_price("bitcoin").await.unwrap_err();
        assert!(matches!(err, MarketError::UpstreamUnavailable(_)));
    }
}
