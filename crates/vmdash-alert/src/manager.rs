use chrono::Utc;
use std::sync::Arc;
use vmdash_common::types::{Alert, AlertChange, AlertDigest};

use crate::error::{AlertError, Result};
use crate::lifecycle::{LifecyclePolicy, Transition};
use crate::policy::{AlertDraft, CreateOutcome, CreatePolicy, RefreshOpenAlert};
use crate::session::Session;
use crate::{AlertRepository, ChangePublisher, StatusChange};

/// Applies lifecycle operations to stored alerts and publishes the result.
///
/// Local state is never touched before the repository confirms a change, so
/// a failed operation leaves both the store and subscribers untouched.
pub struct AlertManager {
    repo: Arc<dyn AlertRepository>,
    publisher: Arc<dyn ChangePublisher>,
    lifecycle: LifecyclePolicy,
    create_policy: Arc<dyn CreatePolicy>,
}

impl AlertManager {
    pub fn new(repo: Arc<dyn AlertRepository>, publisher: Arc<dyn ChangePublisher>) -> Self {
        Self {
            repo,
            publisher,
            lifecycle: LifecyclePolicy::default(),
            create_policy: Arc::new(RefreshOpenAlert),
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecyclePolicy) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_create_policy(mut self, policy: Arc<dyn CreatePolicy>) -> Self {
        self.create_policy = policy;
        self
    }

    pub fn lifecycle(&self) -> LifecyclePolicy {
        self.lifecycle
    }

    pub fn repository(&self) -> &Arc<dyn AlertRepository> {
        &self.repo
    }

    pub async fn get(&self, id: &str) -> Result<Alert> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| AlertError::NotFound(id.to_string()))
    }

    pub async fn digests(&self) -> Result<Vec<AlertDigest>> {
        self.repo.digests().await
    }

    /// Moves an `active` alert to `acknowledged`.
    pub async fn acknowledge(&self, session: &Session, id: &str) -> Result<Alert> {
        let alert = self
            .apply(id, Transition::Acknowledge, Some(session.user_id.clone()))
            .await?;
        tracing::info!(alert_id = %id, user_id = %session.user_id, "Alert acknowledged");
        Ok(alert)
    }

    /// Moves an open alert to `resolved`.
    pub async fn resolve(&self, session: &Session, id: &str) -> Result<Alert> {
        let alert = self.apply(id, Transition::Resolve, None).await?;
        tracing::info!(alert_id = %id, user_id = %session.user_id, "Alert resolved");
        Ok(alert)
    }

    /// System-initiated closure once the breach condition has cleared.
    pub async fn auto_resolve(&self, id: &str) -> Result<Alert> {
        let alert = self.apply(id, Transition::AutoResolve, None).await?;
        tracing::info!(alert_id = %id, "Alert auto-resolved");
        Ok(alert)
    }

    /// Auto-resolves every open alert `rule_id` raised on `resource_name`
    /// that the lifecycle policy permits closing.
    pub async fn auto_resolve_for(&self, rule_id: &str, resource_name: &str) -> Result<Vec<Alert>> {
        let open = self.repo.find_open_by_rule(rule_id, resource_name).await?;
        let mut closed = Vec::new();
        for alert in open {
            if !self.lifecycle.allows(alert.status, Transition::AutoResolve) {
                continue;
            }
            match self.auto_resolve(&alert.id).await {
                Ok(a) => closed.push(a),
                // A human closed it first.
                Err(AlertError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(closed)
    }

    /// Records a breach reported by the evaluator through the configured
    /// [`CreatePolicy`].
    pub async fn create(&self, draft: AlertDraft) -> Result<CreateOutcome> {
        let outcome = self
            .create_policy
            .create(self.repo.as_ref(), draft, Utc::now())
            .await?;
        match &outcome {
            CreateOutcome::Inserted(alert) => {
                tracing::info!(
                    alert_id = %alert.id,
                    resource = %alert.resource_name,
                    severity = %alert.severity,
                    title = %alert.title,
                    "Alert triggered"
                );
                self.publisher.publish(AlertChange::Insert(alert.clone()));
            }
            CreateOutcome::Refreshed(alert) => {
                tracing::debug!(
                    alert_id = %alert.id,
                    current_value = alert.current_value,
                    "Open alert refreshed"
                );
                self.publisher.publish(AlertChange::Update(alert.clone()));
            }
        }
        Ok(outcome)
    }

    async fn apply(&self, id: &str, transition: Transition, actor: Option<String>) -> Result<Alert> {
        let current = self.get(id).await?;
        let to = self
            .lifecycle
            .next(current.status, transition)
            .ok_or_else(|| AlertError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                action: transition.action(),
            })?;

        let change = StatusChange {
            to,
            at: Utc::now(),
            actor,
        };
        match self.repo.transition(id, current.status, &change).await? {
            Some(updated) => {
                self.publisher.publish(AlertChange::Update(updated.clone()));
                Ok(updated)
            }
            None => {
                // Lost a race: report against whatever state won.
                let latest = self.get(id).await?;
                tracing::warn!(
                    alert_id = %id,
                    action = transition.action(),
                    status = %latest.status,
                    "Concurrent transition rejected"
                );
                Err(AlertError::InvalidTransition {
                    id: id.to_string(),
                    from: latest.status,
                    action: transition.action(),
                })
            }
        }
    }
}
