use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use market::AssetSnapshot;

use crate::error::StoreError;
use crate::model::{HistoryPoint, StoredAsset, Subscriber, TrackedAsset};
use crate::repository::{HistoryStore, StateStore, SubscriberRegistry};

/// SQLx-backed implementation of every store capability.
/// Responsible only for persistence and row mapping.
#[derive(Clone)]
pub struct SqlxRepository {
    pool: SqlitePool,
}

impl SqlxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for SqlxRepository {
    async fn upsert_asset(&self, asset: &AssetSnapshot, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
INSERT INTO assets (
  asset_id, symbol, display_name,
  current_price, change_24h_pct, market_cap_rank,
  updated_at_ms
)
VALUES (?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(asset_id) DO UPDATE SET
  current_price = excluded.current_price,
  change_24h_pct = excluded.change_24h_pct,
  market_cap_rank = excluded.market_cap_rank,
  updated_at_ms = excluded.updated_at_ms;
"#,
        )
        .bind(&asset.asset_id)
        .bind(&asset.symbol)
        .bind(&asset.display_name)
        .bind(asset.current_price.to_string())
        .bind(asset.change_24h_pct.map(|d| d.to_string()))
        .bind(asset.market_cap_rank.map(i64::from))
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_all_assets(&self) -> Result<Vec<StoredAsset>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT asset_id, symbol, display_name, current_price, change_24h_pct, market_cap_rank, updated_at_ms
FROM assets
ORDER BY market_cap_rank IS NULL, market_cap_rank, asset_id;
"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_asset(&r) {
                Ok(a) => out.push(a),
                // poison-row resilience: skip but don't fail the listing
                Err(e) => warn!(error = %e, "skipping malformed asset row"),
            }
        }

        Ok(out)
    }

    async fn get_asset(&self, asset_id: &str) -> Result<Option<StoredAsset>, StoreError> {
        let row = sqlx::query(
            r#"
SELECT asset_id, symbol, display_name, current_price, change_24h_pct, market_cap_rank, updated_at_ms
FROM assets
WHERE asset_id = ?;
"#,
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_asset).transpose()
    }

    async fn get_tracked(&self) -> Result<Vec<TrackedAsset>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT asset_id, display_name, symbol, last_alerted_price, subscriber_address, tracked_at_ms
FROM tracked_assets
ORDER BY tracked_at_ms DESC, id DESC;
"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_tracked(&r) {
                Ok(t) => out.push(t),
                Err(e) => warn!(error = %e, "skipping malformed tracked row"),
            }
        }

        Ok(out)
    }

    async fn upsert_tracked(&self, tracked: &TrackedAsset) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
INSERT INTO tracked_assets (
  asset_id, display_name, symbol, last_alerted_price, subscriber_address, tracked_at_ms
)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT(asset_id) DO NOTHING;
"#,
        )
        .bind(&tracked.asset_id)
        .bind(&tracked.display_name)
        .bind(&tracked.symbol)
        .bind(tracked.last_alerted_price.to_string())
        .bind(&tracked.subscriber_address)
        .bind(tracked.tracked_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn delete_tracked(&self, asset_id: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM tracked_assets WHERE asset_id = ?")
            .bind(asset_id)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn update_last_alerted_price(
        &self,
        asset_id: &str,
        price: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE tracked_assets SET last_alerted_price = ? WHERE asset_id = ?")
            .bind(price.to_string())
            .bind(asset_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn assign_unclaimed_tracked(&self, address: &str) -> Result<u64, StoreError> {
        let res = sqlx::query(
            "UPDATE tracked_assets SET subscriber_address = ? WHERE subscriber_address IS NULL",
        )
        .bind(address)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}

#[async_trait]
impl HistoryStore for SqlxRepository {
    async fn append(&self, point: &HistoryPoint) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO asset_history (asset_id, price, recorded_at_ms) VALUES (?, ?, ?)")
            .bind(&point.asset_id)
            .bind(point.price.to_string())
            .bind(point.recorded_at.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_recent(
        &self,
        asset_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryPoint>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
SELECT asset_id, price, recorded_at_ms
FROM asset_history
WHERE asset_id = ?
ORDER BY recorded_at_ms DESC, id DESC
LIMIT ?;
"#,
        )
        .bind(asset_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut points = rows
            .iter()
            .map(row_to_point)
            .collect::<Result<Vec<_>, _>>()?;

        // Newest-first from the query; callers consume chronologically.
        points.reverse();
        points.sort_by_key(|p| p.recorded_at);

        Ok(points)
    }
}

#[async_trait]
impl SubscriberRegistry for SqlxRepository {
    async fn register(&self, address: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
INSERT OR REPLACE INTO subscribers (address, registered_at_ms)
VALUES (?, ?);
"#,
        )
        .bind(address)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn has_subscriber(&self) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM subscribers) AS present")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get::<i64, _>("present")? == 1)
    }

    async fn latest_subscriber(&self) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query(
            r#"
SELECT address, registered_at_ms
FROM subscribers
ORDER BY registered_at_ms DESC, id DESC
LIMIT 1;
"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        Ok(Some(Subscriber {
            address: r.try_get("address")?,
            registered_at: millis_to_utc("registered_at_ms", r.try_get("registered_at_ms")?)?,
        }))
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_asset(r: &SqliteRow) -> Result<StoredAsset, StoreError> {
    let rank: Option<i64> = r.try_get("market_cap_rank")?;

    Ok(StoredAsset {
        asset_id: r.try_get("asset_id")?,
        symbol: r.try_get("symbol")?,
        display_name: r.try_get("display_name")?,
        current_price: parse_decimal("current_price", r.try_get("current_price")?)?,
        change_24h_pct: r
            .try_get::<Option<String>, _>("change_24h_pct")?
            .map(|v| parse_decimal("change_24h_pct", v))
            .transpose()?,
        market_cap_rank: rank
            .map(|v| {
                u32::try_from(v).map_err(|_| StoreError::Decode {
                    column: "market_cap_rank",
                    value: v.to_string(),
                })
            })
            .transpose()?,
        updated_at: millis_to_utc("updated_at_ms", r.try_get("updated_at_ms")?)?,
    })
}

fn row_to_tracked(r: &SqliteRow) -> Result<TrackedAsset, StoreError> {
    Ok(TrackedAsset {
        asset_id: r.try_get("asset_id")?,
        display_name: r.try_get("display_name")?,
        symbol: r.try_get("symbol")?,
        last_alerted_price: parse_decimal("last_alerted_price", r.try_get("last_alerted_price")?)?,
        subscriber_address: r.try_get("subscriber_address")?,
        tracked_at: millis_to_utc("tracked_at_ms", r.try_get("tracked_at_ms")?)?,
    })
}

fn row_to_point(r: &SqliteRow) -> Result<HistoryPoint, StoreError> {
    Ok(HistoryPoint {
        asset_id: r.try_get("asset_id")?,
        price: parse_decimal("price", r.try_get("price")?)?,
        recorded_at: millis_to_utc("recorded_at_ms", r.try_get("recorded_at_ms")?)?,
    })
}

fn parse_decimal(column: &'static str, value: String) -> Result<Decimal, StoreError> {
    Decimal::from_str(&value).map_err(|_| StoreError::Decode { column, value })
}

fn millis_to_utc(column: &'static str, ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::Decode {
        column,
        value: ms.to_string(),
    })
}
