//! Alert transports for the notification dispatcher.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use scheduler::Notifier;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Delivers alerts through the Telegram Bot API `sendMessage` method.
/// The subscriber address is the chat id.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: Client,
    // Carries the bot token; never log it.
    send_url: String,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, bot_token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building telegram http client")?;

        Ok(Self {
            http,
            send_url: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), bot_token),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, message), level = "debug")]
    async fn notify(&self, address: &str, message: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(&self.send_url)
            .json(&SendMessage {
                chat_id: address,
                text: message,
                parse_mode: "Markdown",
            })
            .send()
            .await
            .context("telegram sendMessage request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("telegram sendMessage returned {status}: {body}");
        }

        Ok(())
    }
}

/// Stand-in transport when no bot token is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, address: &str, message: &str) -> anyhow::Result<()> {
        info!(%address, %message, "alert (no transport configured)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_url_ignores_trailing_slash() {
        let n = TelegramNotifier::new("https://api.telegram.org/", "123:abc", Duration::from_secs(1))
            .unwrap();

        assert_eq!(n.send_url, "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[tokio::test]
    async fn unreachable_api_is_an_error() {
        let n = TelegramNotifier::new("http://127.0.0.1:9", "t", Duration::from_millis(500)).unwrap();

        assert!(n.notify("42", "hello").await.is_err());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.notify("42", "*hi*").await.is_ok());
    }
}
