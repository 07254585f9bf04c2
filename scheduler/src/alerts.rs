//! Price-move detection for tracked assets.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{Instrument, debug, error, info, instrument, warn};

use common::{TraceId, cycle_span, warn_if_slow};
use store::{StateStore, StoreError, TrackedAsset};

use crate::notify::NotificationQueue;
use crate::price_source::PriceSource;
use crate::runner::PeriodicJob;
use crate::types::{AlertConfig, AlertReport};

/// Relative move from `last` to `current`, in percent.
///
/// A zero `last` means the asset has never been priced, which is reported
/// as no move. Results that overflow saturate in the direction of the move.
pub fn delta_pct(current: Decimal, last: Decimal) -> Decimal {
    if last.is_zero() {
        return Decimal::ZERO;
    }

    let diff = current - last;

    diff.checked_div(last)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or_else(|| {
            if diff.is_sign_negative() != last.is_sign_negative() {
                Decimal::MIN
            } else {
                Decimal::MAX
            }
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn of(delta: Decimal) -> Self {
        if delta > Decimal::ZERO {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("📈 Up"),
            Direction::Down => f.write_str("📉 Down"),
        }
    }
}

/// One detected move, addressed to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub address: String,
    pub asset_id: String,
    pub display_name: String,
    pub symbol: String,
    pub direction: Direction,
    pub delta_pct: Decimal,
    pub price: Decimal,
}

impl PriceAlert {
    /// Markdown body sent to the subscriber.
    pub fn render(&self) -> String {
        let delta = self
            .delta_pct
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        format!(
            "{} *{}* ({})\n\nChange: *{:.2}%*\nCurrent price: *${}*",
            self.direction,
            self.display_name,
            self.symbol.to_uppercase(),
            delta,
            self.price.normalize(),
        )
    }
}

#[derive(Debug, Default)]
struct AssetOutcome {
    skipped: bool,
    alerted: bool,
    failed: bool,
}

pub struct AlertLoop {
    prices: Arc<dyn PriceSource>,
    state: Arc<dyn StateStore>,
    queue: NotificationQueue,
    cfg: AlertConfig,
}

impl AlertLoop {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        state: Arc<dyn StateStore>,
        queue: NotificationQueue,
        cfg: AlertConfig,
    ) -> Self {
        Self {
            prices,
            state,
            queue,
            cfg,
        }
    }

    /// Evaluates every tracked asset that has a subscriber.
    ///
    /// Fails only when the tracked list itself cannot be read. Per-asset
    /// problems are counted in the report and never stop the other assets.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<AlertReport, StoreError> {
        let tracked = self.state.get_tracked().await?;

        let subscribed: Vec<(String, TrackedAsset)> = tracked
            .into_iter()
            .filter_map(|t| t.subscriber_address.clone().map(|addr| (addr, t)))
            .collect();

        let outcomes: Vec<AssetOutcome> = stream::iter(subscribed)
            .map(|(address, asset)| self.evaluate(address, asset))
            .buffer_unordered(self.cfg.concurrency.max(1))
            .collect()
            .await;

        let mut report = AlertReport {
            checked: outcomes.len(),
            ..Default::default()
        };
        for o in &outcomes {
            report.skipped += usize::from(o.skipped);
            report.alerted += usize::from(o.alerted);
            report.failures += usize::from(o.failed);
        }

        Ok(report)
    }

    async fn evaluate(&self, address: String, asset: TrackedAsset) -> AssetOutcome {
        let mut outcome = AssetOutcome::default();

        let lookup = tokio::time::timeout(
            self.cfg.fetch_timeout,
            self.prices.current_price(&asset.asset_id),
        )
        .await;

        let current = match lookup {
            Ok(Ok(Some(p))) if p > Decimal::ZERO => p,
            Ok(Ok(_)) => {
                debug!(asset_id = %asset.asset_id, "no price this cycle");
                outcome.skipped = true;
                return outcome;
            }
            Ok(Err(e)) => {
                warn!(asset_id = %asset.asset_id, error = %e, "price lookup failed");
                outcome.failed = true;
                return outcome;
            }
            Err(_) => {
                warn!(
                    asset_id = %asset.asset_id,
                    timeout_ms = self.cfg.fetch_timeout.as_millis() as u64,
                    "price lookup timed out"
                );
                outcome.failed = true;
                return outcome;
            }
        };

        let last = asset.last_alerted_price;
        let delta = delta_pct(current, last);

        if !last.is_zero() && delta.abs() >= self.cfg.threshold_pct {
            let alert = PriceAlert {
                address,
                asset_id: asset.asset_id.clone(),
                display_name: asset.display_name.clone(),
                symbol: asset.symbol.clone(),
                direction: Direction::of(delta),
                delta_pct: delta,
                price: current,
            };

            if self.queue.push(alert) {
                outcome.alerted = true;
            } else {
                outcome.failed = true;
            }
        }

        // The baseline moves every cycle, alert or not.
        if let Err(e) = self
            .state
            .update_last_alerted_price(&asset.asset_id, current)
            .await
        {
            warn!(asset_id = %asset.asset_id, error = %e, "last price update failed");
            outcome.failed = true;
        }

        outcome
    }
}

#[async_trait]
impl PeriodicJob for AlertLoop {
    fn name(&self) -> &'static str {
        "alerts"
    }

    async fn run_once(&self) {
        let span = cycle_span(self.name(), TraceId::new());

        async {
            let budget = self.cfg.interval / 2;

            match warn_if_slow("alert cycle", budget, self.run_cycle()).await {
                Ok(r) => info!(
                    checked = r.checked,
                    skipped = r.skipped,
                    alerted = r.alerted,
                    failures = r.failures,
                    "alert cycle complete"
                ),
                Err(e) => error!(error = %e, "alert cycle failed: tracked assets unavailable"),
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn one_percent_up() {
        assert_eq!(delta_pct(dec!(101), dec!(100)), dec!(1));
    }

    #[test]
    fn first_sight_is_no_move() {
        assert_eq!(delta_pct(dec!(50), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn render_uppercases_symbol_and_rounds_delta() {
        let alert = PriceAlert {
            address: "chat-1".into(),
            asset_id: "bitcoin".into(),
            display_name: "Bitcoin".into(),
            symbol: "btc".into(),
            direction: Direction::Down,
            delta_pct: dec!(-2.345),
            price: dec!(58123.50),
        };

        assert_eq!(
            alert.render(),
            "📉 Down *Bitcoin* (BTC)\n\nChange: *-2.35%*\nCurrent price: *$58123.5*"
        );
    }

    #[test]
    fn whole_delta_is_padded_to_two_places() {
        let alert = PriceAlert {
            address: "chat-1".into(),
            asset_id: "ethereum".into(),
            display_name: "Ethereum".into(),
            symbol: "eth".into(),
            direction: Direction::Up,
            delta_pct: dec!(1),
            price: dec!(101),
        };

        assert!(alert.render().contains("Change: *1.00%*"));
        assert!(alert.render().starts_with("📈 Up"));
    }

    fn price() -> impl Strategy<Value = Decimal> {
        (1i64..10_000_000_000i64, 0u32..8).prop_map(|(m, s)| Decimal::new(m, s))
    }

    proptest! {
        #[test]
        fn delta_sign_follows_the_move(current in price(), last in price()) {
            let d = delta_pct(current, last);

            prop_assert_eq!(d.is_zero(), current == last);
            prop_assert_eq!(d > Decimal::ZERO, current > last);
            prop_assert_eq!(Direction::of(d) == Direction::Up, current > last);
        }

        #[test]
        fn unchanged_price_never_moves(p in price()) {
            prop_assert_eq!(delta_pct(p, p), Decimal::ZERO);
        }

        #[test]
        fn drops_are_bounded_by_one_hundred(current in price(), last in price()) {
            prop_assume!(current < last);
            let d = delta_pct(current, last);

            prop_assert!(d > Decimal::from(-100));
            prop_assert!(d < Decimal::ZERO);
        }
    }
}
