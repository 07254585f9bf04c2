use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Latest persisted state of one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAsset {
    pub asset_id: String,
    pub symbol: String,
    pub display_name: String,
    pub current_price: Decimal,
    pub change_24h_pct: Option<Decimal>,
    pub market_cap_rank: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

/// One price observation. Points are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub asset_id: String,
    pub price: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// An asset on the watchlist.
///
/// `last_alerted_price` starts at zero and is afterwards the last price the
/// alert loop observed, alerted or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedAsset {
    pub asset_id: String,
    pub display_name: String,
    pub symbol: String,
    pub last_alerted_price: Decimal,
    pub subscriber_address: Option<String>,
    pub tracked_at: DateTime<Utc>,
}

impl TrackedAsset {
    pub fn new(
        asset_id: impl Into<String>,
        display_name: impl Into<String>,
        symbol: impl Into<String>,
        subscriber_address: Option<String>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            display_name: display_name.into(),
            symbol: symbol.into(),
            last_alerted_price: Decimal::ZERO,
            subscriber_address,
            tracked_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscriber {
    pub address: String,
    pub registered_at: DateTime<Utc>,
}
