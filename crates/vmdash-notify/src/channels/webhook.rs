use crate::error::{NotifyError, Result};
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::{NotificationChannel, Recipient};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use vmdash_common::types::Alert;

const MAX_ATTEMPTS: u32 = 3;

/// Request body posted once per recipient.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub alert: &'a Alert,
    pub user: &'a Recipient,
}

/// POSTs `{alert, user}` to an HTTP endpoint (e.g. a mail-sending edge
/// function), authenticated with a bearer service key.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
    service_key: Option<String>,
}

impl WebhookChannel {
    pub fn new(url: &str, service_key: Option<String>, timeout: Duration) -> Result<Self> {
        if url.is_empty() {
            return Err(NotifyError::InvalidConfig("webhook url is empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            service_key,
        })
    }

    async fn post_once(&self, body: &WebhookPayload<'_>) -> Result<()> {
        let mut req = self.client.post(self.url.as_str()).json(body);
        if let Some(ref key) = self.service_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = match resp.text().await {
            Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
            Err(e) => format!("[Failed to read response body: {}]", e),
        };
        Err(NotifyError::ApiError {
            service: "webhook".to_string(),
            status: status.as_u16(),
            body: text,
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &Alert, recipient: &Recipient) -> Result<()> {
        let body = WebhookPayload {
            alert,
            user: recipient,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.post_once(&body).await {
                Ok(()) => {
                    tracing::info!(
                        alert_id = %alert.id,
                        recipient = %recipient.email,
                        "Notification sent"
                    );
                    return Ok(());
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        recipient = %recipient.email,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt - 1))).await;
                }
                Err(e) => {
                    tracing::error!(
                        url = %self.url,
                        recipient = %recipient.email,
                        error = %e,
                        "Webhook failed after {MAX_ATTEMPTS} attempts"
                    );
                    return Err(e);
                }
            }
        }
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
