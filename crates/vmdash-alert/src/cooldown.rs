use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Longest cooldown honoured; larger configured values are clamped.
pub const MAX_COOLDOWN_SECS: i64 = 365 * 24 * 3600;

fn window(cooldown_secs: u64) -> Duration {
    let secs = i64::try_from(cooldown_secs).map_or(MAX_COOLDOWN_SECS, |s| s.min(MAX_COOLDOWN_SECS));
    Duration::seconds(secs)
}

/// Key: (rule_id, resource_name)
type CooldownKey = (String, String);

/// Remembers when each rule last raised an alert for a resource.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_fired: HashMap<CooldownKey, (DateTime<Utc>, u64)>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `(rule_id, resource)` raised within the last `cooldown_secs`.
    pub fn is_cooling(
        &self,
        rule_id: &str,
        resource: &str,
        cooldown_secs: u64,
        now: DateTime<Utc>,
    ) -> bool {
        self.last_fired
            .get(&(rule_id.to_string(), resource.to_string()))
            .is_some_and(|(last, _)| now - *last < window(cooldown_secs))
    }

    pub fn start(&mut self, rule_id: &str, resource: &str, cooldown_secs: u64, now: DateTime<Utc>) {
        self.last_fired.insert(
            (rule_id.to_string(), resource.to_string()),
            (now, cooldown_secs),
        );
    }

    /// Drops expired entries and returns how many are still cooling.
    pub fn active_count(&mut self, now: DateTime<Utc>) -> usize {
        self.last_fired
            .retain(|_, (last, secs)| now - *last < window(*secs));
        self.last_fired.len()
    }

    pub fn clear(&mut self) {
        self.last_fired.clear();
    }
}
