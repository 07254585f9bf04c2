use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use backend::config::AppConfig;
use backend::context::AppContext;
use common::init_logger;
use scheduler::{NotificationQueue, spawn_dispatcher, spawn_periodic};

const DISPATCHER_DRAIN_LIMIT: Duration = Duration::from_secs(10);

/// Fills the snapshot cache so the first reader does not pay for the fetch.
fn warm_snapshot_cache(ctx: &AppContext) {
    let snapshots = ctx.snapshots.clone();

    tokio::spawn(async move {
        match snapshots.get_snapshot().await {
            Ok(s) => info!(assets = s.len(), "snapshot cache warmed"),
            Err(e) => warn!(error = %e, "snapshot cache warm-up failed"),
        }
    });
}

async fn join(name: &'static str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        error!(job = name, error = ?e, "task ended abnormally");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env();
    init_logger("market-pulse", cfg.production);
    cfg.log_issues();

    info!("Starting market pulse backend...");

    let ctx = AppContext::build(cfg).await.context("building app context")?;

    match ctx.watchlist.subscriber_connected().await {
        Ok(true) => info!("subscriber registered; alerts enabled"),
        Ok(false) => warn!("no subscriber registered yet; tracking is disabled until one connects"),
        Err(e) => warn!(error = %e, "could not read subscriber registry"),
    }

    warm_snapshot_cache(&ctx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (queue, queue_rx) = NotificationQueue::bounded(ctx.cfg.notify_queue_capacity);
    let dispatcher = spawn_dispatcher(queue_rx, ctx.notifier()?);

    // Ingestion also runs once right away; its failures never block startup.
    let ingestion = spawn_periodic(
        Arc::new(ctx.ingestion_loop()),
        ctx.cfg.ingest_interval,
        true,
        shutdown_rx.clone(),
    );
    let alerts = spawn_periodic(
        Arc::new(ctx.alert_loop(queue)),
        ctx.cfg.alert_interval,
        false,
        shutdown_rx,
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    join("ingestion", ingestion).await;
    join("alerts", alerts).await;

    // The alert job held the last queue handle, so the dispatcher now drains
    // what is left and exits.
    if tokio::time::timeout(DISPATCHER_DRAIN_LIMIT, join("dispatcher", dispatcher))
        .await
        .is_err()
    {
        warn!("notification dispatcher did not drain in time");
    }

    ctx.db.pool.close().await;
    info!("Shutdown complete");

    Ok(())
}
