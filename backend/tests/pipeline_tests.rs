//! End-to-end wiring against an in-memory SQLite database.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal_macros::dec;

use backend::config::AppConfig;
use backend::context::AppContext;
use market::AssetDetail;
use scheduler::NotificationQueue;
use store::{HistoryStore, StateStore, StoreError, TrackOutcome};

use mock_feed::{ScriptedFeed, asset};

async fn context(extra: &[(&str, &str)]) -> (Arc<ScriptedFeed>, AppContext) {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".into(), "sqlite::memory:".into()),
        ("DATABASE_MAX_CONNECTIONS".into(), "1".into()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    let cfg = AppConfig::from_lookup(|k| vars.get(k).cloned());

    let feed = Arc::new(ScriptedFeed::default());
    let ctx = AppContext::with_feed(cfg, feed.clone())
        .await
        .expect("build context");

    (feed, ctx)
}

#[tokio::test]
async fn ingestion_persists_state_and_history() {
    let (feed, ctx) = context(&[]).await;
    feed.list(vec![
        asset("ethereum", 2, dec!(3000)),
        asset("bitcoin", 1, dec!(60000)),
    ]);

    let report = ctx.ingestion_loop().run_cycle().await.unwrap();
    assert_eq!(report.upserted, 2);
    assert_eq!(report.appended, 2);

    let stored = ctx.repo.get_all_assets().await.unwrap();
    assert_eq!(stored[0].asset_id, "bitcoin");
    assert_eq!(ctx.repo.get_recent("bitcoin", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn tracking_then_alerting_round_trip() {
    let (feed, ctx) = context(&[]).await;

    let err = ctx.watchlist.track("bitcoin", "Bitcoin", "btc").await.unwrap_err();
    assert!(matches!(err, StoreError::NoSubscriber));

    ctx.watchlist.register_subscriber("chat-42").await.unwrap();
    assert_eq!(
        ctx.watchlist.track("bitcoin", "Bitcoin", "btc").await.unwrap(),
        TrackOutcome::Tracked
    );

    let (queue, mut rx) = NotificationQueue::bounded(8);
    let alerts = ctx.alert_loop(queue);

    // first sight only records the baseline
    feed.price("bitcoin", dec!(100));
    let first = alerts.run_cycle().await.unwrap();
    assert_eq!(first.alerted, 0);

    feed.price("bitcoin", dec!(101));
    let second = alerts.run_cycle().await.unwrap();
    assert_eq!(second.alerted, 1);

    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.address, "chat-42");
    assert!(alert.render().contains("(BTC)"));

    let tracked = ctx.watchlist.tracked().await.unwrap();
    assert_eq!(tracked[0].last_alerted_price, dec!(101));
}

#[tokio::test]
async fn state_price_source_follows_ingestion() {
    let (feed, ctx) = context(&[("ALERT_PRICE_SOURCE", "state")]).await;
    ctx.watchlist.register_subscriber("chat-1").await.unwrap();
    ctx.watchlist.track("bitcoin", "Bitcoin", "btc").await.unwrap();
    ctx.repo.update_last_alerted_price("bitcoin", dec!(100)).await.unwrap();

    let (queue, mut rx) = NotificationQueue::bounded(8);
    let alerts = ctx.alert_loop(queue);

    // nothing ingested yet
    assert_eq!(alerts.run_cycle().await.unwrap().skipped, 1);

    feed.list(vec![asset("bitcoin", 1, dec!(90))]);
    ctx.ingestion_loop().run_cycle().await.unwrap();

    assert_eq!(alerts.run_cycle().await.unwrap().alerted, 1);
    assert_eq!(rx.try_recv().unwrap().delta_pct, dec!(-10));
}

#[tokio::test]
async fn caches_serve_the_feed() {
    let (feed, ctx) = context(&[]).await;
    feed.list(vec![asset("bitcoin", 1, dec!(1))]);

    let snapshot = ctx.snapshots.get_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);

    let detail: AssetDetail = ctx.details.get_detail("bitcoin").await.unwrap();
    assert_eq!(detail.display_name, "BITCOIN");
    assert_eq!(detail.homepage, market::types::UNAVAILABLE);
}
