//! Fire-and-forget delivery of price alerts.
//!
//! The alert job pushes into a bounded queue and never waits on delivery.
//! A single dispatcher task drains the queue into the [`Notifier`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alerts::PriceAlert;

/// Message transport to a subscriber address. Best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, address: &str, message: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct NotificationQueue {
    tx: Sender<PriceAlert>,
}

impl NotificationQueue {
    pub fn bounded(capacity: usize) -> (Self, Receiver<PriceAlert>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueues without waiting. A full or closed queue drops the alert.
    pub fn push(&self, alert: PriceAlert) -> bool {
        match self.tx.try_send(alert) {
            Ok(()) => true,
            Err(TrySendError::Full(a)) => {
                warn!(asset_id = %a.asset_id, "notification queue full; alert dropped");
                false
            }
            Err(TrySendError::Closed(a)) => {
                warn!(asset_id = %a.asset_id, "notification queue closed; alert dropped");
                false
            }
        }
    }
}

/// Drains `rx` into `notifier` until every queue handle is dropped.
pub fn spawn_dispatcher(mut rx: Receiver<PriceAlert>, notifier: Arc<dyn Notifier>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(component = "dispatcher", "notification dispatcher started");

        while let Some(alert) = rx.recv().await {
            let message = alert.render();

            match notifier.notify(&alert.address, &message).await {
                Ok(()) => debug!(asset_id = %alert.asset_id, "alert delivered"),
                Err(e) => warn!(
                    asset_id = %alert.asset_id,
                    address = %alert.address,
                    error = ?e,
                    "alert delivery failed"
                ),
            }
        }

        info!(component = "dispatcher", "notification queue closed; dispatcher stopped");
    })
}
