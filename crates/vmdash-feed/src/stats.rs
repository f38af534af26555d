use std::collections::HashMap;
use vmdash_common::types::{Alert, AlertDigest, AlertStats, AlertStatus, Severity};

/// `id -> (status, severity)` over the whole collection, independent of the
/// viewer's filter. Seeded at resync and patched per event, so the counters
/// it derives stay consistent with the feed without refetching.
#[derive(Debug, Default, Clone)]
pub struct StatsIndex {
    entries: HashMap<String, (AlertStatus, Severity)>,
}

impl StatsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, digests: Vec<AlertDigest>) {
        self.entries = digests
            .into_iter()
            .map(|d| (d.id, (d.status, d.severity)))
            .collect();
    }

    pub fn apply(&mut self, alert: &Alert) {
        self.entries
            .insert(alert.id.clone(), (alert.status, alert.severity));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> AlertStats {
        let mut stats = AlertStats::default();
        for (status, severity) in self.entries.values() {
            stats.record(*status, *severity);
        }
        stats
    }
}
