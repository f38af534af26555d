use anyhow::Context;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use vmdash_common::types::{Alert, AlertRuleDef};

use crate::engine::{AlertEngine, EngineAction};
use crate::manager::AlertManager;
use crate::policy::CreateOutcome;
use crate::rules::threshold::ThresholdRule;
use crate::MetricSource;

/// Alerts touched by one evaluation pass of a rule.
#[derive(Debug, Default, Clone)]
pub struct EvaluationReport {
    pub inserted: Vec<Alert>,
    pub refreshed: Vec<Alert>,
    pub auto_resolved: Vec<Alert>,
    /// Resources whose action failed in this pass. They are retried on the
    /// next tick.
    pub failed: Vec<String>,
}

/// Samples a [`MetricSource`] for a rule and applies the engine's actions
/// through the [`AlertManager`].
pub struct Evaluator {
    engine: Mutex<AlertEngine>,
    source: Arc<dyn MetricSource>,
    manager: Arc<AlertManager>,
}

impl Evaluator {
    pub fn new(source: Arc<dyn MetricSource>, manager: Arc<AlertManager>) -> Self {
        Self {
            engine: Mutex::new(AlertEngine::new()),
            source,
            manager,
        }
    }

    pub fn manager(&self) -> &Arc<AlertManager> {
        &self.manager
    }

    pub fn cooldowns_active(&self) -> usize {
        self.engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .cooldowns_active(Utc::now())
    }

    pub fn reset_cooldowns(&self) {
        self.engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .reset();
    }

    pub async fn run_rule(&self, def: &AlertRuleDef) -> anyhow::Result<EvaluationReport> {
        let rule = ThresholdRule::try_from(def)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid rule {}", def.id))?;

        let readings = self
            .source
            .sample(def)
            .await
            .with_context(|| format!("Failed to sample metrics for rule {}", def.name))?;
        if readings.is_empty() {
            tracing::debug!(rule_id = %def.id, "No data for rule");
        }

        let actions = {
            let mut engine = self
                .engine
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            engine.evaluate(&rule, &readings, Utc::now())
        };

        let mut report = EvaluationReport::default();
        for action in actions {
            match action {
                EngineAction::Raise(draft) => {
                    let resource = draft.resource_name.clone();
                    match self.manager.create(draft).await {
                        Ok(outcome) => {
                            self.engine
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner())
                                .commit(&def.id, &resource, def.cooldown_seconds, Utc::now());
                            match outcome {
                                CreateOutcome::Inserted(alert) => report.inserted.push(alert),
                                CreateOutcome::Refreshed(alert) => report.refreshed.push(alert),
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                rule_id = %def.id,
                                resource = %resource,
                                error = %e,
                                "Failed to raise alert"
                            );
                            report.failed.push(resource);
                        }
                    }
                }
                EngineAction::Clear {
                    rule_id,
                    resource_name,
                    value,
                } => match self.manager.auto_resolve_for(&rule_id, &resource_name).await {
                    Ok(closed) => {
                        if !closed.is_empty() {
                            tracing::info!(
                                rule_id = %rule_id,
                                resource = %resource_name,
                                value,
                                count = closed.len(),
                                "Auto-resolved alerts after metric recovered"
                            );
                        }
                        report.auto_resolved.extend(closed);
                    }
                    Err(e) => {
                        tracing::warn!(
                            rule_id = %rule_id,
                            resource = %resource_name,
                            error = %e,
                            "Failed to auto-resolve alerts"
                        );
                        report.failed.push(resource_name);
                    }
                },
            }
        }
        Ok(report)
    }
}
