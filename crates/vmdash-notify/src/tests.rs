use crate::channels::webhook::{WebhookChannel, WebhookPayload};
use crate::error::{NotifyError, Result};
use crate::manager::NotificationManager;
use crate::routing::ChannelRoute;
use crate::utils::truncate_string;
use crate::{DeliveryStatus, NotificationChannel, Recipient};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vmdash_common::types::{Alert, AlertCategory, AlertStatus, Severity};

fn make_alert(severity: Severity) -> Alert {
    Alert {
        id: "1".into(),
        severity,
        status: AlertStatus::Active,
        category: AlertCategory::NodeHealth,
        resource_name: "node-a".into(),
        metric_name: "cpu_usage".into(),
        current_value: 95.2,
        threshold_value: 90.0,
        title: "HIGH: Cpu Usage alert on node-a".into(),
        message: "Cpu Usage is 95.2%".into(),
        triggered_at: Utc::now(),
        alert_rule_id: None,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        updated_at: None,
    }
}

fn recipients() -> Vec<Recipient> {
    vec![
        Recipient {
            email: "ops@example.com".into(),
            name: Some("Ops".into()),
        },
        Recipient {
            email: "bounce@example.com".into(),
            name: None,
        },
    ]
}

struct RecordingChannel {
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, _alert: &Alert, recipient: &Recipient) -> Result<()> {
        if recipient.email.starts_with("bounce") {
            return Err(NotifyError::ApiError {
                service: "webhook".into(),
                status: 500,
                body: "mailbox unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(recipient.email.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

#[test]
fn routing_severity_filter() {
    let route_high = ChannelRoute {
        min_severity: Severity::High,
        channel_index: 0,
    };
    let route_low = ChannelRoute {
        min_severity: Severity::Low,
        channel_index: 1,
    };

    assert!(!route_high.should_send(Severity::Low));
    assert!(!route_high.should_send(Severity::Medium));
    assert!(route_high.should_send(Severity::High));

    assert!(route_low.should_send(Severity::Low));
    assert!(route_low.should_send(Severity::High));
}

#[tokio::test]
async fn manager_records_every_recipient() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let manager = NotificationManager::new(
        vec![Box::new(RecordingChannel { sent: sent.clone() })],
        vec![ChannelRoute {
            min_severity: Severity::High,
            channel_index: 0,
        }],
        recipients(),
    );

    let records = manager.notify(&make_alert(Severity::High)).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, DeliveryStatus::Sent);
    assert_eq!(records[0].channel, "recording");
    assert_eq!(records[1].status, DeliveryStatus::Failed);
    assert!(records[1].error.as_deref().unwrap().contains("500"));
    assert_eq!(*sent.lock().unwrap(), vec!["ops@example.com".to_string()]);
}

#[tokio::test]
async fn manager_skips_alerts_below_min_severity() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let manager = NotificationManager::new(
        vec![Box::new(RecordingChannel { sent: sent.clone() })],
        vec![ChannelRoute {
            min_severity: Severity::High,
            channel_index: 0,
        }],
        recipients(),
    );

    assert!(manager.notify(&make_alert(Severity::Medium)).await.is_empty());
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn manager_without_recipients_sends_nothing() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let manager = NotificationManager::new(
        vec![Box::new(RecordingChannel { sent: sent.clone() })],
        vec![ChannelRoute {
            min_severity: Severity::Low,
            channel_index: 0,
        }],
        vec![],
    );
    assert!(manager.notify(&make_alert(Severity::High)).await.is_empty());
}

#[test]
fn webhook_payload_shape() {
    let alert = make_alert(Severity::High);
    let user = Recipient {
        email: "ops@example.com".into(),
        name: Some("Ops".into()),
    };
    let body = serde_json::to_value(WebhookPayload {
        alert: &alert,
        user: &user,
    })
    .unwrap();
    assert_eq!(body["alert"]["id"], "1");
    assert_eq!(body["alert"]["severity"], "high");
    assert_eq!(body["user"]["email"], "ops@example.com");
}

#[test]
fn webhook_rejects_empty_url() {
    let err = WebhookChannel::new("", None, Duration::from_secs(10)).err().unwrap();
    assert!(matches!(err, NotifyError::InvalidConfig(_)));
}

#[tokio::test]
async fn webhook_reports_unreachable_endpoint() {
    // Port 9 (discard) is closed on test hosts.
    let channel =
        WebhookChannel::new("http://127.0.0.1:9/send", None, Duration::from_secs(1)).unwrap();
    let user = Recipient {
        email: "ops@example.com".into(),
        name: None,
    };
    let err = channel.send(&make_alert(Severity::High), &user).await.unwrap_err();
    assert!(matches!(err, NotifyError::HttpError(_)));
}

#[test]
fn truncate_respects_char_boundaries() {
    assert_eq!(truncate_string("hello", 10), "hello");
    assert_eq!(truncate_string("hello world", 5), "hello... [truncated]");
    assert_eq!(truncate_string("héllo", 2), "h... [truncated]");
}
