use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Placeholder rendered for detail fields the provider left empty.
pub const UNAVAILABLE: &str = "N/A";

pub const NO_DESCRIPTION: &str = "No description available.";

/// One row of the market listing, as of a single fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub asset_id: String,
    pub symbol: String,
    pub display_name: String,
    pub current_price: Decimal,
    pub change_24h_pct: Option<Decimal>,
    pub market_cap_rank: Option<u32>,

    /// 7d price series, oldest first. Only present when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparkline: Option<Vec<Decimal>>,
}

/// Provider payload for a single asset, before normalisation.
///
/// Every field is optional on the wire; [`AssetDetail::from_raw`] decides
/// what the client sees.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawAssetDetail {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<RawDescription>,
    #[serde(default)]
    pub hashing_algorithm: Option<String>,
    #[serde(default)]
    pub genesis_date: Option<String>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub links: Option<RawLinks>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDescription {
    #[serde(default)]
    pub en: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawLinks {
    #[serde(default)]
    pub homepage: Option<Vec<Option<String>>>,
}

/// Enriched per-asset metadata served by the detail endpoint.
///
/// No field is ever null: gaps are filled with [`UNAVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDetail {
    pub asset_id: String,
    pub symbol: String,
    pub display_name: String,
    pub description: String,
    pub algorithm: String,
    pub genesis_date: String,
    pub market_cap_rank: String,
    pub homepage: String,
}

impl AssetDetail {
    pub fn from_raw(requested_id: &str, raw: RawAssetDetail) -> Self {
        let homepage = raw
            .links
            .and_then(|l| l.homepage)
            .and_then(|links| links.into_iter().flatten().find(|h| !h.trim().is_empty()));

        Self {
            asset_id: non_empty(raw.id).unwrap_or_else(|| requested_id.to_string()),
            symbol: or_unavailable(raw.symbol),
            display_name: or_unavailable(raw.name),
            description: non_empty(raw.description.and_then(|d| d.en))
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            algorithm: or_unavailable(raw.hashing_algorithm),
            genesis_date: or_unavailable(raw.genesis_date),
            market_cap_rank: raw
                .market_cap_rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            homepage: homepage.unwrap_or_else(|| UNAVAILABLE.to_string()),
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

fn or_unavailable(v: Option<String>) -> String {
    non_empty(v).unwrap_or_else(|| UNAVAILABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_become_sentinels() {
        let d = AssetDetail::from_raw("obscure-coin", RawAssetDetail::default());

        assert_eq!(d.asset_id, "obscure-coin");
        assert_eq!(d.symbol, UNAVAILABLE);
        assert_eq!(d.description, NO_DESCRIPTION);
        assert_eq!(d.algorithm, UNAVAILABLE);
        assert_eq!(d.genesis_date, UNAVAILABLE);
        assert_eq!(d.market_cap_rank, UNAVAILABLE);
        assert_eq!(d.homepage, UNAVAILABLE);
    }

    #[test]
    fn normalises_provider_payload() {
        let raw: RawAssetDetail = serde_json::from_value(serde_json::json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "description": { "en": "" },
            "hashing_algorithm": "SHA-256",
            "genesis_date": null,
            "market_cap_rank": 1,
            "links": { "homepage": [null, "", "https://bitcoin.org"] }
        }))
        .unwrap();

        let d = AssetDetail::from_raw("bitcoin", raw);

        assert_eq!(d.display_name, "Bitcoin");
        assert_eq!(d.description, NO_DESCRIPTION);
        assert_eq!(d.algorithm, "SHA-256");
        assert_eq!(d.genesis_date, UNAVAILABLE);
        assert_eq!(d.market_cap_rank, "1");
        assert_eq!(d.homepage, "https://bitcoin.org");
    }
}
