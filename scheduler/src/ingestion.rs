//! Periodic pull of the upstream listing into current state and history.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{Instrument, error, info, instrument, warn};

use common::{TraceId, cycle_span, warn_if_slow};
use market::feed::with_deadline;
use market::{MarketError, MarketFeed};
use store::{HistoryPoint, HistoryStore, StateStore};

use crate::runner::PeriodicJob;
use crate::types::{IngestionConfig, IngestionReport};

pub struct IngestionLoop {
    feed: Arc<dyn MarketFeed>,
    state: Arc<dyn StateStore>,
    history: Arc<dyn HistoryStore>,
    cfg: IngestionConfig,
}

impl IngestionLoop {
    pub fn new(
        feed: Arc<dyn MarketFeed>,
        state: Arc<dyn StateStore>,
        history: Arc<dyn HistoryStore>,
        cfg: IngestionConfig,
    ) -> Self {
        Self {
            feed,
            state,
            history,
            cfg,
        }
    }

    /// One fetch, write-through and append pass.
    ///
    /// Only a failed snapshot fetch fails the cycle, and nothing is written
    /// in that case. Upserts and appends are attempted for every asset and
    /// fail independently of each other.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<IngestionReport, MarketError> {
        let assets = with_deadline(
            "market snapshot",
            self.cfg.fetch_timeout,
            self.feed.fetch_market_snapshot(false),
        )
        .await?;

        let now = Utc::now();
        let mut report = IngestionReport {
            fetched: assets.len(),
            ..Default::default()
        };

        for asset in &assets {
            match self.state.upsert_asset(asset, now).await {
                Ok(()) => report.upserted += 1,
                Err(e) => {
                    report.upsert_failures += 1;
                    warn!(asset_id = %asset.asset_id, error = %e, "asset upsert failed");
                }
            }

            let point = HistoryPoint {
                asset_id: asset.asset_id.clone(),
                price: asset.current_price,
                recorded_at: now,
            };

            match self.history.append(&point).await {
                Ok(()) => report.appended += 1,
                Err(e) => {
                    report.append_failures += 1;
                    warn!(asset_id = %asset.asset_id, error = %e, "history append failed");
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl PeriodicJob for IngestionLoop {
    fn name(&self) -> &'static str {
        "ingestion"
    }

    async fn run_once(&self) {
        let span = cycle_span(self.name(), TraceId::new());

        async {
            let budget = self.cfg.interval / 2;

            match warn_if_slow("ingestion cycle", budget, self.run_cycle()).await {
                Ok(r) => info!(
                    fetched = r.fetched,
                    upserted = r.upserted,
                    upsert_failures = r.upsert_failures,
                    appended = r.appended,
                    append_failures = r.append_failures,
                    "ingestion cycle complete"
                ),
                Err(e) => error!(error = %e, "ingestion cycle skipped: upstream fetch failed"),
            }
        }
        .instrument(span)
        .await
    }
}
