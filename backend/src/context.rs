//! Everything built once at startup and shared behind `Arc`s.

use std::sync::Arc;

use anyhow::Context;

use market::coingecko::CoinGeckoClient;
use market::{DetailCache, MarketFeed, SnapshotCache};
use scheduler::{
    AlertLoop, FeedPriceSource, IngestionLoop, NotificationQueue, Notifier, PriceSource,
    PriceSourceKind, StatePriceSource,
};
use store::db::Db;
use store::{SqlxRepository, WatchlistService};

use crate::config::AppConfig;
use crate::telegram::{LogNotifier, TelegramNotifier};

pub struct AppContext {
    pub cfg: AppConfig,
    pub db: Db,
    pub feed: Arc<dyn MarketFeed>,
    pub repo: Arc<SqlxRepository>,

    /// Read side for request handlers.
    pub snapshots: Arc<SnapshotCache>,
    pub details: Arc<DetailCache>,
    pub watchlist: Arc<WatchlistService>,
}

impl AppContext {
    /// Connects to the database, applies the schema and wires the
    /// CoinGecko feed.
    pub async fn build(cfg: AppConfig) -> anyhow::Result<Self> {
        let feed = CoinGeckoClient::new(cfg.coingecko_api_url.clone(), cfg.upstream_timeout)
            .context("building coingecko client")?;

        Self::with_feed(cfg, Arc::new(feed)).await
    }

    pub async fn with_feed(cfg: AppConfig, feed: Arc<dyn MarketFeed>) -> anyhow::Result<Self> {
        let db = Db::connect(&cfg.database_url, cfg.database_max_connections)
            .await
            .with_context(|| format!("connecting to {}", cfg.database_url))?;
        db.migrate().await.context("applying schema")?;

        let repo = Arc::new(SqlxRepository::new(db.pool.clone()));

        Ok(Self {
            snapshots: Arc::new(SnapshotCache::new(feed.clone(), cfg.snapshot_cache())),
            details: Arc::new(DetailCache::new(feed.clone(), cfg.detail_cache())),
            watchlist: Arc::new(WatchlistService::new(repo.clone(), repo.clone())),
            cfg,
            db,
            feed,
            repo,
        })
    }

    pub fn ingestion_loop(&self) -> IngestionLoop {
        IngestionLoop::new(
            self.feed.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.cfg.ingestion(),
        )
    }

    pub fn price_source(&self) -> Arc<dyn PriceSource> {
        match self.cfg.alert_price_source {
            PriceSourceKind::Upstream => Arc::new(FeedPriceSource::new(
                self.feed.clone(),
                self.cfg.alerts().fetch_timeout,
            )),
            PriceSourceKind::State => Arc::new(StatePriceSource::new(self.repo.clone())),
        }
    }

    pub fn alert_loop(&self, queue: NotificationQueue) -> AlertLoop {
        AlertLoop::new(
            self.price_source(),
            self.repo.clone(),
            queue,
            self.cfg.alerts(),
        )
    }

    pub fn notifier(&self) -> anyhow::Result<Arc<dyn Notifier>> {
        match &self.cfg.telegram_bot_token {
            Some(token) => Ok(Arc::new(TelegramNotifier::new(
                &self.cfg.telegram_api_url,
                token,
                self.cfg.upstream_timeout,
            )?)),
            None => Ok(Arc::new(LogNotifier)),
        }
    }
}
