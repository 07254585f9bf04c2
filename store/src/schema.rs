use sqlx::SqlitePool;

use crate::error::StoreError;

/// Creates every table and index the stores need. Idempotent.
pub async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    // Latest known state per asset
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS assets (
  asset_id TEXT PRIMARY KEY,
  symbol TEXT NOT NULL,
  display_name TEXT NOT NULL,
  current_price TEXT NOT NULL,
  change_24h_pct TEXT,
  market_cap_rank INTEGER,
  updated_at_ms INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Append-only price history
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS asset_history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  asset_id TEXT NOT NULL,
  price TEXT NOT NULL,
  recorded_at_ms INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Watchlist
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS tracked_assets (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  asset_id TEXT NOT NULL UNIQUE,
  display_name TEXT NOT NULL,
  symbol TEXT NOT NULL,
  last_alerted_price TEXT NOT NULL DEFAULT '0',
  subscriber_address TEXT,
  tracked_at_ms INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Notification targets
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS subscribers (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  address TEXT NOT NULL UNIQUE,
  registered_at_ms INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_asset_history_asset_time ON asset_history(asset_id, recorded_at_ms);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_subscribers_registered ON subscribers(registered_at_ms);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
