use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use vmdash_common::types::{Alert, AlertCategory, AlertDigest, AlertStatus};

use crate::error::{AlertError, Result};
use crate::{AlertRepository, StatusChange};

/// In-process [`AlertRepository`], used by tests and single-node setups
/// without a database.
#[derive(Default)]
pub struct MemoryAlertRepository {
    alerts: Mutex<HashMap<String, Alert>>,
}

impl MemoryAlertRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Alert>> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Every stored alert, in no particular order.
    pub fn snapshot(&self) -> Vec<Alert> {
        self.lock().values().cloned().collect()
    }
}

#[async_trait]
impl AlertRepository for MemoryAlertRepository {
    async fn get(&self, id: &str) -> Result<Option<Alert>> {
        Ok(self.lock().get(id).cloned())
    }

    async fn insert(&self, alert: &Alert) -> Result<Alert> {
        let mut alerts = self.lock();
        if alerts.contains_key(&alert.id) {
            return Err(AlertError::TransientIo(format!(
                "duplicate alert id {}",
                alert.id
            )));
        }
        alerts.insert(alert.id.clone(), alert.clone());
        Ok(alert.clone())
    }

    async fn transition(
        &self,
        id: &str,
        expected: AlertStatus,
        change: &StatusChange,
    ) -> Result<Option<Alert>> {
        let mut alerts = self.lock();
        let Some(alert) = alerts.get_mut(id) else {
            return Ok(None);
        };
        if alert.status != expected {
            return Ok(None);
        }
        alert.status = change.to;
        alert.updated_at = Some(change.at);
        match change.to {
            AlertStatus::Acknowledged => {
                alert.acknowledged_at = Some(change.at);
                alert.acknowledged_by = change.actor.clone();
            }
            AlertStatus::Resolved | AlertStatus::AutoResolved => {
                alert.resolved_at = Some(change.at);
            }
            AlertStatus::Active => {}
        }
        Ok(Some(alert.clone()))
    }

    async fn refresh_value(
        &self,
        id: &str,
        current_value: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let mut alerts = self.lock();
        match alerts.get_mut(id) {
            Some(alert) if alert.status.is_open() => {
                alert.current_value = current_value;
                alert.updated_at = Some(at);
                Ok(Some(alert.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_open(
        &self,
        resource_name: &str,
        metric_name: &str,
        category: AlertCategory,
    ) -> Result<Option<Alert>> {
        Ok(self
            .lock()
            .values()
            .filter(|a| a.status.is_open() && a.dedup_key() == (resource_name, metric_name, category))
            .max_by_key(|a| a.triggered_at)
            .cloned())
    }

    async fn find_open_by_rule(&self, rule_id: &str, resource_name: &str) -> Result<Vec<Alert>> {
        let mut open: Vec<Alert> = self
            .lock()
            .values()
            .filter(|a| {
                a.status.is_open()
                    && a.alert_rule_id.as_deref() == Some(rule_id)
                    && a.resource_name == resource_name
            })
            .cloned()
            .collect();
        open.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(open)
    }

    async fn digests(&self) -> Result<Vec<AlertDigest>> {
        Ok(self.lock().values().map(Alert::digest).collect())
    }
}
