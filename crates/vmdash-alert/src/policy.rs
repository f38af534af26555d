use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use vmdash_common::types::{Alert, AlertCategory, AlertStatus, Severity};

use crate::error::Result;
use crate::AlertRepository;

/// An evaluator's request to raise an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub severity: Severity,
    pub category: AlertCategory,
    pub resource_name: String,
    pub metric_name: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub title: String,
    pub message: String,
    pub alert_rule_id: Option<String>,
}

impl AlertDraft {
    /// Materializes the draft as a new `active` alert.
    pub fn into_alert(self, id: String, now: DateTime<Utc>) -> Alert {
        Alert {
            id,
            severity: self.severity,
            status: AlertStatus::Active,
            category: self.category,
            resource_name: self.resource_name,
            metric_name: self.metric_name,
            current_value: self.current_value,
            threshold_value: self.threshold_value,
            title: self.title,
            message: self.message,
            triggered_at: now,
            alert_rule_id: self.alert_rule_id,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            updated_at: Some(now),
        }
    }
}

/// What a [`CreatePolicy`] did with a draft.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A new alert row was inserted.
    Inserted(Alert),
    /// An existing open alert had its `current_value` refreshed.
    Refreshed(Alert),
}

impl CreateOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            CreateOutcome::Inserted(a) | CreateOutcome::Refreshed(a) => a,
        }
    }
}

/// Deduplication policy applied when the evaluator reports a breach.
#[async_trait]
pub trait CreatePolicy: Send + Sync {
    fn name(&self) -> &str;

    async fn create(
        &self,
        repo: &dyn AlertRepository,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome>;
}

/// Refreshes the open alert raised by the same rule for the same resource
/// instead of inserting a second one.
///
/// Drafts without a rule id fall back to the `(resource_name, metric_name,
/// category)` tuple. Two rules watching one metric at different severities
/// therefore keep separate alerts.
pub struct RefreshOpenAlert;

impl RefreshOpenAlert {
    async fn open_for(repo: &dyn AlertRepository, draft: &AlertDraft) -> Result<Option<Alert>> {
        match draft.alert_rule_id {
            Some(ref rule_id) => Ok(repo
                .find_open_by_rule(rule_id, &draft.resource_name)
                .await?
                .into_iter()
                .next()),
            None => {
                repo.find_open(&draft.resource_name, &draft.metric_name, draft.category)
                    .await
            }
        }
    }
}

#[async_trait]
impl CreatePolicy for RefreshOpenAlert {
    fn name(&self) -> &str {
        "refresh_open"
    }

    async fn create(
        &self,
        repo: &dyn AlertRepository,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome> {
        if let Some(open) = Self::open_for(repo, &draft).await? {
            if let Some(updated) = repo.refresh_value(&open.id, draft.current_value, now).await? {
                return Ok(CreateOutcome::Refreshed(updated));
            }
            // Closed between the lookup and the refresh: fall through to insert.
        }
        let alert = draft.into_alert(vmdash_common::id::next_id(), now);
        Ok(CreateOutcome::Inserted(repo.insert(&alert).await?))
    }
}

/// Inserts a new alert for every breach; repeated breaches are throttled
/// only by the rule cooldown.
pub struct AlwaysInsert;

#[async_trait]
impl CreatePolicy for AlwaysInsert {
    fn name(&self) -> &str {
        "always_insert"
    }

    async fn create(
        &self,
        repo: &dyn AlertRepository,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome> {
        let alert = draft.into_alert(vmdash_common::id::next_id(), now);
        Ok(CreateOutcome::Inserted(repo.insert(&alert).await?))
    }
}

/// Looks up a policy by its configured name.
pub fn policy_by_name(name: &str) -> Option<Arc<dyn CreatePolicy>> {
    match name {
        "refresh_open" => Some(Arc::new(RefreshOpenAlert)),
        "always_insert" => Some(Arc::new(AlwaysInsert)),
        _ => None,
    }
}
