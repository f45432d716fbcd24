//! Fire-and-forget webhook notifier.
//!
//! Delivery is strictly best-effort: every failure (connect, timeout,
//! non-success status) is logged at `warn` and reported as `false`. The
//! pipeline never blocks on or fails because of this path.

use std::time::Duration;

use async_trait::async_trait;
use draftpress_core::NotificationSink;
use draftpress_domain::{PipelineError, Result};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs pipeline notifications as JSON to a configured webhook URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier for the given webhook URL.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|err| PipelineError::Config(format!("webhook client: {err}")))?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, message: &str) -> bool {
        let body = json!({ "content": message });

        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("webhook notification delivered");
                true
            }
            Ok(response) => {
                warn!(status = %response.status(), "webhook rejected notification");
                false
            }
            Err(err) => {
                warn!(error = %err, "webhook notification failed");
                false
            }
        }
    }
}
