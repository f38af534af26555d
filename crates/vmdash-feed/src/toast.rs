use std::time::Duration;
use vmdash_common::types::{AlertChange, Severity};

/// When a toast goes away on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastDismiss {
    After(Duration),
    /// Stays until the user closes it.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub alert_id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub dismiss: ToastDismiss,
}

/// Severity-gated notification policy. Only inserts raise toasts:
/// `low` none, `medium` auto-dismissed, `high` persistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastPolicy {
    pub medium_dismiss_after: Duration,
}

impl Default for ToastPolicy {
    fn default() -> Self {
        Self {
            medium_dismiss_after: Duration::from_secs(5),
        }
    }
}

impl ToastPolicy {
    pub fn toast_for(&self, change: &AlertChange) -> Option<Toast> {
        let AlertChange::Insert(alert) = change else {
            return None;
        };
        let dismiss = match alert.severity {
            Severity::Low => return None,
            Severity::Medium => ToastDismiss::After(self.medium_dismiss_after),
            Severity::High => ToastDismiss::Manual,
        };
        Some(Toast {
            alert_id: alert.id.clone(),
            severity: alert.severity,
            title: alert.title.clone(),
            message: alert.message.clone(),
            dismiss,
        })
    }
}
