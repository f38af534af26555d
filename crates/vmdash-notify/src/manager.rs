use crate::routing::ChannelRoute;
use crate::{DeliveryRecord, DeliveryStatus, NotificationChannel, Recipient};
use chrono::Utc;
use vmdash_common::types::Alert;

pub struct NotificationManager {
    channels: Vec<Box<dyn NotificationChannel>>,
    routes: Vec<ChannelRoute>,
    recipients: Vec<Recipient>,
}

impl NotificationManager {
    pub fn new(
        channels: Vec<Box<dyn NotificationChannel>>,
        routes: Vec<ChannelRoute>,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self {
            channels,
            routes,
            recipients,
        }
    }

    /// Sends `alert` through every route whose severity floor it meets, once
    /// per recipient. Failures are logged and recorded, never returned.
    pub async fn notify(&self, alert: &Alert) -> Vec<DeliveryRecord> {
        let mut records = Vec::new();
        if self.recipients.is_empty() {
            tracing::warn!(alert_id = %alert.id, "No recipients configured for notifications");
            return records;
        }

        for route in &self.routes {
            if !route.should_send(alert.severity) {
                continue;
            }
            let Some(channel) = self.channels.get(route.channel_index) else {
                continue;
            };

            for recipient in &self.recipients {
                let (status, error) = match channel.send(alert, recipient).await {
                    Ok(()) => (DeliveryStatus::Sent, None),
                    Err(e) => {
                        tracing::error!(
                            channel = channel.channel_name(),
                            alert_id = %alert.id,
                            recipient = %recipient.email,
                            error = %e,
                            "Failed to send notification"
                        );
                        (DeliveryStatus::Failed, Some(e.to_string()))
                    }
                };
                records.push(DeliveryRecord {
                    alert_id: alert.id.clone(),
                    recipient: recipient.email.clone(),
                    channel: channel.channel_name().to_string(),
                    status,
                    error,
                    sent_at: Utc::now(),
                });
            }
        }
        records
    }

    pub fn channels(&self) -> &[Box<dyn NotificationChannel>] {
        &self.channels
    }
}
