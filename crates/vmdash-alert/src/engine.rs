use crate::cooldown::CooldownTracker;
use crate::policy::AlertDraft;
use crate::rules::AlertRule;
use crate::MetricReading;
use chrono::{DateTime, Utc};

/// What the engine decided for one reading.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// The condition is met and the rule is out of cooldown. The caller
    /// commits the cooldown after the alert is stored.
    Raise(AlertDraft),
    /// The condition no longer holds for this resource.
    Clear {
        rule_id: String,
        resource_name: String,
        value: f64,
    },
}

pub struct AlertEngine {
    cooldowns: CooldownTracker,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertEngine {
    pub fn new() -> Self {
        Self {
            cooldowns: CooldownTracker::new(),
        }
    }

    /// Number of (rule, resource) pairs currently in cooldown.
    pub fn cooldowns_active(&mut self, now: DateTime<Utc>) -> usize {
        self.cooldowns.active_count(now)
    }

    /// Forgets all cooldowns, used when the rule set is reloaded from scratch.
    pub fn reset(&mut self) {
        self.cooldowns.clear();
    }

    /// Starts the cooldown for `(rule_id, resource)`. Called once the raised
    /// alert has been stored, so a failed write does not silence the breach.
    pub fn commit(&mut self, rule_id: &str, resource: &str, cooldown_secs: u64, now: DateTime<Utc>) {
        self.cooldowns.start(rule_id, resource, cooldown_secs, now);
    }

    pub fn evaluate(
        &mut self,
        rule: &dyn AlertRule,
        readings: &[MetricReading],
        now: DateTime<Utc>,
    ) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        let rule_id = rule.id();

        for reading in readings {
            if !rule.is_breached(reading) {
                tracing::debug!(
                    rule_id,
                    resource = %reading.resource_name,
                    value = reading.value,
                    "Alert condition not met"
                );
                actions.push(EngineAction::Clear {
                    rule_id: rule_id.to_string(),
                    resource_name: reading.resource_name.clone(),
                    value: reading.value,
                });
                continue;
            }

            let cooldown = rule.cooldown_secs();
            if self
                .cooldowns
                .is_cooling(rule_id, &reading.resource_name, cooldown, now)
            {
                tracing::debug!(
                    rule_id,
                    resource = %reading.resource_name,
                    "Alert suppressed (cooldown)"
                );
                continue;
            }

            tracing::info!(
                rule_id,
                rule_name = rule.name(),
                resource = %reading.resource_name,
                value = reading.value,
                "Alert condition met"
            );
            actions.push(EngineAction::Raise(rule.draft(reading)));
        }

        actions
    }
}
