//! Configuration and per-cycle reports for the background jobs.

use std::time::Duration;

use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub interval: Duration,

    /// Upper bound on the upstream snapshot call.
    pub fetch_timeout: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub interval: Duration,

    /// Minimum absolute move, in percent, that triggers a notification.
    pub threshold_pct: Decimal,

    /// How many tracked assets are evaluated at once.
    pub concurrency: usize,

    /// Upper bound on each price lookup, whatever the price source.
    pub fetch_timeout: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            threshold_pct: Decimal::ONE,
            concurrency: 4,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of one ingestion cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub fetched: usize,
    pub upserted: usize,
    pub upsert_failures: usize,
    pub appended: usize,
    pub append_failures: usize,
}

/// Outcome of one alert cycle.
///
/// `checked` counts every subscribed row looked at; `skipped` rows had no
/// price this cycle. `failures` counts price lookups, queue pushes and
/// last-price writes that went wrong.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertReport {
    pub checked: usize,
    pub skipped: usize,
    pub alerted: usize,
    pub failures: usize,
}
