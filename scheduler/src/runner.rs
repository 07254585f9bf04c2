//! Fixed-cadence driver shared by the background jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::info;

/// A job run once per tick. `run_once` owns its own error reporting: the
/// runner never sees a failure and never stops because of one.
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run_once(&self);
}

/// Runs `job` every `every` until `shutdown` flips to `true` or its sender
/// is dropped.
///
/// With `run_at_start` one extra cycle runs immediately, outside the
/// schedule. Shutdown is only observed between cycles; a running cycle is
/// always allowed to finish.
pub fn spawn_periodic(
    job: Arc<dyn PeriodicJob>,
    every: Duration,
    run_at_start: bool,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));

    tokio::spawn(async move {
        info!(job = job.name(), every_secs = every.as_secs(), "job scheduled");

        if run_at_start && !*shutdown.borrow() {
            job.run_once().await;
        }

        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            job.run_once().await;
        }

        info!(job = job.name(), "job stopped");
    })
}
