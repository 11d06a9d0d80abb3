// src/notify.rs

//! Webhook notification delivery.
//!
//! Delivery failure is logged, never fatal: a missed message costs a
//! re-notification later, aborting the checking loop costs the watch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::NotifyConfig;

/// Sink for change notifications.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Deliver a message. Implementations log failures and return
    /// normally; delivery is never retried within a cycle and never
    /// blocks the state update.
    async fn send(&self, message: &str);
}

/// Notifier posting `{"content": ...}` to a Discord-compatible webhook.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
        })
    }

    async fn post(&self, url: &str, message: &str) -> Result<()> {
        let payload = serde_json::json!({ "content": message });
        self.client
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notify for WebhookNotifier {
    async fn send(&self, message: &str) {
        let Some(url) = self.webhook_url.as_deref() else {
            log::warn!("No webhook URL configured; skipping notification: {message}");
            return;
        };

        match self.post(url, message).await {
            Ok(()) => log::info!("Notification sent: {message}"),
            Err(e) => log::warn!("Failed to send notification: {e}"),
        }
    }
}
