//! Outbound alert notification.
//!
//! New alerts are routed to one or more [`NotificationChannel`]
//! implementations based on severity. Every attempt to reach a recipient
//! produces a [`DeliveryRecord`] that the caller persists.

pub mod channels;
pub mod error;
pub mod manager;
pub mod routing;
pub mod utils;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vmdash_common::types::Alert;

/// A person who receives alert notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A notification delivery channel that sends alerts to an external service.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers `alert` to one recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after retries (if applicable).
    async fn send(&self, alert: &Alert, recipient: &Recipient) -> error::Result<()>;

    /// Returns the channel type name (e.g., `"webhook"`).
    fn channel_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Outcome of delivering one alert to one recipient over one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub alert_id: String,
    pub recipient: String,
    pub channel: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}
