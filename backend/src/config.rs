use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::warn;

use market::coingecko::client::DEFAULT_BASE_URL;
use market::{DetailCacheConfig, SnapshotCacheConfig};
use scheduler::{AlertConfig, IngestionConfig, PriceSourceKind};

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Pool size. SQLite serialises writers regardless; readers benefit.
    pub database_max_connections: u32,

    // =========================
    // Upstream
    // =========================
    pub coingecko_api_url: String,

    /// Bounds every upstream request, both at the HTTP client and around
    /// each awaited call.
    pub upstream_timeout: Duration,

    // =========================
    // Caches
    // =========================
    pub snapshot_ttl: Duration,
    pub detail_ttl: Duration,

    // =========================
    // Background jobs
    // =========================
    pub ingest_interval: Duration,
    pub alert_interval: Duration,

    /// Minimum absolute move, in percent, that notifies a subscriber.
    pub alert_threshold_pct: Decimal,

    pub alert_price_source: PriceSourceKind,

    /// Tracked assets evaluated concurrently per alert cycle.
    pub alert_concurrency: usize,

    // =========================
    // Notifications
    // =========================
    /// Alerts waiting for delivery. When full, new alerts are dropped.
    pub notify_queue_capacity: usize,

    /// Without a token alerts are only logged.
    pub telegram_bot_token: Option<String>,
    pub telegram_api_url: String,

    pub production: bool,

    /// Values that were set but rejected, one line each.
    pub issues: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Missing keys take their
    /// default; unparseable values take their default and are listed in
    /// [`AppConfig::issues`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut env = EnvReader {
            lookup,
            issues: Vec::new(),
        };

        let database_url = env
            .get("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://market_pulse.db?mode=rwc".to_string());
        let database_max_connections = env.parse_or("DATABASE_MAX_CONNECTIONS", 8u32).max(1);

        let coingecko_api_url = env
            .get("COINGECKO_API_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let upstream_timeout = env.secs("UPSTREAM_TIMEOUT_SECS", 10);

        let snapshot_ttl = env.secs("SNAPSHOT_TTL_SECS", 60);
        let detail_ttl = env.secs("DETAIL_TTL_SECS", 600);

        let ingest_interval = env.secs("INGEST_INTERVAL_SECS", 300);
        let alert_interval = env.secs("ALERT_INTERVAL_SECS", 300);

        let mut alert_threshold_pct: Decimal = env.parse_or("ALERT_THRESHOLD_PCT", Decimal::ONE);
        if alert_threshold_pct.is_sign_negative() {
            env.issues.push(format!(
                "ALERT_THRESHOLD_PCT={alert_threshold_pct}: negative threshold; using 1"
            ));
            alert_threshold_pct = Decimal::ONE;
        }
        let alert_price_source = env.parse_or("ALERT_PRICE_SOURCE", PriceSourceKind::Upstream);
        let alert_concurrency = env.parse_or("ALERT_CONCURRENCY", 4usize).max(1);

        let notify_queue_capacity = env.parse_or("NOTIFY_QUEUE_CAPACITY", 256usize).max(1);
        let telegram_bot_token = env.get("TELEGRAM_BOT_TOKEN");
        let telegram_api_url = env
            .get("TELEGRAM_API_URL")
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string());

        let production = env.get("APP_ENV").is_some_and(|v| v == "production");

        Self {
            database_url,
            database_max_connections,
            coingecko_api_url,
            upstream_timeout,
            snapshot_ttl,
            detail_ttl,
            ingest_interval,
            alert_interval,
            alert_threshold_pct,
            alert_price_source,
            alert_concurrency,
            notify_queue_capacity,
            telegram_bot_token,
            telegram_api_url,
            production,
            issues: env.issues,
        }
    }

    /// Emits one warning per rejected value. Call once logging is up.
    pub fn log_issues(&self) {
        for issue in &self.issues {
            warn!(%issue, "invalid config value; using default");
        }
    }

    pub fn snapshot_cache(&self) -> SnapshotCacheConfig {
        SnapshotCacheConfig {
            ttl: self.snapshot_ttl,
            fetch_timeout: self.upstream_timeout,
        }
    }

    pub fn detail_cache(&self) -> DetailCacheConfig {
        DetailCacheConfig {
            ttl: self.detail_ttl,
            fetch_timeout: self.upstream_timeout,
        }
    }

    pub fn ingestion(&self) -> IngestionConfig {
        IngestionConfig {
            interval: self.ingest_interval,
            fetch_timeout: self.upstream_timeout,
        }
    }

    pub fn alerts(&self) -> AlertConfig {
        AlertConfig {
            interval: self.alert_interval,
            threshold_pct: self.alert_threshold_pct,
            concurrency: self.alert_concurrency,
            fetch_timeout: self.upstream_timeout,
        }
    }
}

struct EnvReader<F> {
    lookup: F,
    issues: Vec<String>,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T>(&mut self, key: &'static str, default: T) -> T
    where
        T: FromStr + Display,
        T::Err: Display,
    {
        let Some(raw) = self.get(key) else {
            return default;
        };

        match raw.trim().parse() {
            Ok(v) => v,
            Err(e) => {
                self.issues
                    .push(format!("{key}={raw}: {e}; using {default}"));
                default
            }
        }
    }

    fn secs(&mut self, key: &'static str, default: u64) -> Duration {
        match self.parse_or(key, default) {
            0 => {
                self.issues
                    .push(format!("{key}=0: zero duration; using {default}"));
                Duration::from_secs(default)
            }
            v => Duration::from_secs(v),
        }
    }
}
