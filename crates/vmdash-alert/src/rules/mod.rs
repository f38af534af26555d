pub mod threshold;

use crate::policy::AlertDraft;
use crate::MetricReading;
use vmdash_common::types::Severity;

/// A rule that inspects one metric reading and decides whether the
/// monitored resource is in breach.
///
/// Implementations are held by the [`crate::engine::AlertEngine`], which
/// handles cooldown between consecutive raises for the same rule/resource
/// pair.
pub trait AlertRule: Send + Sync {
    /// Unique identifier for this rule instance (the stored rule id).
    fn id(&self) -> &str;

    /// Human-readable name (e.g., `"Node CPU high"`).
    fn name(&self) -> &str;

    /// The metric this rule applies to (e.g., `"cpu_usage"`).
    fn metric(&self) -> &str;

    fn severity(&self) -> Severity;

    /// Minimum seconds between consecutive raises for the same resource.
    fn cooldown_secs(&self) -> u64;

    /// Returns whether `reading` breaches the rule's condition.
    fn is_breached(&self, reading: &MetricReading) -> bool;

    /// Builds the alert to raise for a breaching reading.
    fn draft(&self, reading: &MetricReading) -> AlertDraft;
}
