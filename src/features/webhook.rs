//! Webhook notifications.
//!
//! Forwards security events to an external endpoint in the background.

use crate::config::{Config, NexusError, Result};
use crate::control::logs::{SecurityEvent, Severity};
use pingora_limits::rate::Rate;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Deliveries of one message per minute.
const MAX_PER_MESSAGE: isize = 3;
/// Deliveries of all messages per minute.
const MAX_PER_MINUTE: isize = 60;
const ALL_MESSAGES_KEY: &str = "*";

/// Webhook payload for a security event.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub app: String,
    pub timestamp: String,
    pub severity: Severity,
    pub message: String,
}

pub struct WebhookNotifier {
    client: Client,
    app_name: String,
    webhook_url: Option<String>,
    webhook_token: Option<String>,
    window: Rate,
}

impl WebhookNotifier {
    #[must_use]
    pub fn new(config: &Arc<Config>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            app_name: config.app_name.clone(),
            webhook_url: config.webhook_url.clone(),
            webhook_token: config.webhook_token.clone(),
            window: Rate::new(Duration::from_secs(60)),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Counts one delivery of `message` and reports whether it stays within
    /// the per-message and overall ceilings.
    fn admit(&self, message: &str) -> bool {
        let per_message = self.window.observe(&message, 1);
        if per_message > MAX_PER_MESSAGE {
            return false;
        }
        self.window.observe(&ALL_MESSAGES_KEY, 1) <= MAX_PER_MINUTE
    }

    /// Sends `event` without waiting for delivery. A no-op without a URL,
    /// outside a Tokio runtime, or once the event's message or the notifier as
    /// a whole has hit its per-minute ceiling.
    pub fn notify(&self, event: &SecurityEvent) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        if !self.admit(&event.message) {
            debug!(message = %event.message, "Webhook notification throttled");
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, webhook notification skipped");
            return;
        };

        let payload = WebhookPayload {
            app: self.app_name.clone(),
            timestamp: event.timestamp.clone(),
            severity: event.severity,
            message: event.message.clone(),
        };
        let client = self.client.clone();
        let token = self.webhook_token.clone();
        handle.spawn(async move {
            if let Err(e) = Self::send_notification(&client, &url, token.as_deref(), &payload).await
            {
                error!(error = %e, "Webhook notification failed");
            }
        });
    }

    async fn send_notification(
        client: &Client,
        url: &str,
        token: Option<&str>,
        payload: &WebhookPayload,
    ) -> Result<()> {
        let (tags, title, priority) = match payload.severity {
            Severity::Info => ("information_source", "Security Notice", 2),
            Severity::Warning => ("warning", "Security Warning", 4),
            Severity::Critical => ("rotating_light", "Security Alert", 5),
        };

        let mut req = client
            .post(url)
            .header("Title", format!("{}: {title}", payload.app))
            .header("Priority", priority.to_string())
            .header("Tags", tags)
            .body(payload.message.clone());

        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {t}"));
        }

        req.send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| NexusError::Webhook(e.to_string()))?;

        debug!(severity = ?payload.severity, "Webhook notification sent");
        Ok(())
    }
}
