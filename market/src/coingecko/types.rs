use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::errors::GeckoError;
use crate::types::AssetSnapshot;

/// One element of `/coins/markets`.
#[derive(Debug, Deserialize)]
pub struct MarketRow {
    pub id: String,
    pub symbol: String,
    pub name: String,

    pub current_price: Option<Decimal>,

    #[serde(default)]
    pub price_change_percentage_24h: Option<Decimal>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub sparkline_in_7d: Option<SparklineIn7d>,
}

#[derive(Debug, Deserialize)]
pub struct SparklineIn7d {
    #[serde(default)]
    pub price: Vec<Option<Decimal>>,
}

impl MarketRow {
    /// `None` when the provider has no price for this asset yet.
    fn into_snapshot(self) -> Option<AssetSnapshot> {
        let current_price = self.current_price?;

        Some(AssetSnapshot {
            asset_id: self.id,
            symbol: self.symbol,
            display_name: self.name,
            current_price,
            change_24h_pct: self.price_change_percentage_24h,
            market_cap_rank: self.market_cap_rank,
            sparkline: self
                .sparkline_in_7d
                .map(|s| s.price.into_iter().flatten().collect()),
        })
    }
}

/// Parses a `/coins/markets` body.
///
/// The body must be a JSON array. Individual malformed or priceless rows are
/// dropped so one bad listing does not take the whole snapshot down.
pub fn parse_markets(body: Value) -> Result<Vec<AssetSnapshot>, GeckoError> {
    let Value::Array(rows) = body else {
        return Err(GeckoError::InvalidResponse(format!(
            "expected array of markets, got {}",
            kind_of(&body)
        )));
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<MarketRow>(row) {
            Ok(r) => {
                let id = r.id.clone();
                match r.into_snapshot() {
                    Some(s) => out.push(s),
                    None => debug!(asset_id = %id, "skipping market row without price"),
                }
            }
            Err(e) => warn!(error = %e, "skipping malformed market row"),
        }
    }

    Ok(out)
}

/// Extracts `body[asset_id].usd` from a `/simple/price` body.
///
/// Missing, non-numeric and non-positive prices all read as "no price".
pub fn parse_simple_price(body: &Value, asset_id: &str) -> Option<Decimal> {
    let raw = body.get(asset_id)?.get("usd")?;
    let price: Decimal = serde_json::from_value(raw.clone()).ok()?;

    (price > Decimal::ZERO).then_some(price)
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
