use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use vmdash_common::types::Severity;
///
/// let sev: Severity = "medium".parse().unwrap();
/// assert_eq!(sev, Severity::Medium);
/// assert_eq!(sev.to_string(), "medium");
/// assert!(Severity::High > Severity::Low);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Lifecycle status of an alert.
///
/// `Active` and `Acknowledged` are open; `Resolved` and `AutoResolved` are
/// terminal for that alert instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    AutoResolved,
}

impl AlertStatus {
    pub const ALL: [AlertStatus; 4] = [
        AlertStatus::Active,
        AlertStatus::Acknowledged,
        AlertStatus::Resolved,
        AlertStatus::AutoResolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::AutoResolved => "auto_resolved",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, AlertStatus::Active | AlertStatus::Acknowledged)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            "auto_resolved" => Ok(AlertStatus::AutoResolved),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// Classification tag of the monitored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    NodeHealth,
    VmResource,
    VmStatus,
    Application,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::NodeHealth => "node_health",
            AlertCategory::VmResource => "vm_resource",
            AlertCategory::VmStatus => "vm_status",
            AlertCategory::Application => "application",
        }
    }
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node_health" => Ok(AlertCategory::NodeHealth),
            "vm_resource" => Ok(AlertCategory::VmResource),
            "vm_status" => Ok(AlertCategory::VmStatus),
            "application" => Ok(AlertCategory::Application),
            _ => Err(format!("unknown alert category: {s}")),
        }
    }
}

/// A detected threshold breach on a monitored resource/metric pair.
///
/// The field names are the wire contract shared by the store, the HTTP API
/// and the realtime feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub category: AlertCategory,
    pub resource_name: String,
    pub metric_name: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub title: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    /// Rule that raised this alert, if it came from the evaluator
    #[serde(default)]
    pub alert_rule_id: Option<String>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// User id of the session that acknowledged the alert
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// The deduplication key of an open alert.
    pub fn dedup_key(&self) -> (&str, &str, AlertCategory) {
        (&self.resource_name, &self.metric_name, self.category)
    }

    pub fn digest(&self) -> AlertDigest {
        AlertDigest {
            id: self.id.clone(),
            status: self.status,
            severity: self.severity,
        }
    }
}

/// The slice of an alert that aggregate statistics depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AlertDigest {
    pub id: String,
    pub status: AlertStatus,
    pub severity: Severity,
}

/// Per-severity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SeverityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

impl SeverityCounts {
    pub fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
        }
    }
}

/// Aggregate alert counters across the whole collection.
///
/// `by_severity` counts active alerts only.
///
/// # Examples
///
/// ```
/// use vmdash_common::types::{AlertDigest, AlertStats, AlertStatus, Severity};
///
/// let digests = vec![
///     AlertDigest { id: "1".into(), status: AlertStatus::Active, severity: Severity::High },
///     AlertDigest { id: "2".into(), status: AlertStatus::Resolved, severity: Severity::Low },
/// ];
/// let stats = AlertStats::from_digests(digests.iter());
/// assert_eq!(stats.total_active, 1);
/// assert_eq!(stats.by_severity.high, 1);
/// assert_eq!(stats.by_severity.low, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AlertStats {
    pub total_active: u64,
    pub total_acknowledged: u64,
    pub total_resolved: u64,
    pub total_auto_resolved: u64,
    pub by_severity: SeverityCounts,
}

impl AlertStats {
    pub fn record(&mut self, status: AlertStatus, severity: Severity) {
        match status {
            AlertStatus::Active => {
                self.total_active += 1;
                self.by_severity.bump(severity);
            }
            AlertStatus::Acknowledged => self.total_acknowledged += 1,
            AlertStatus::Resolved => self.total_resolved += 1,
            AlertStatus::AutoResolved => self.total_auto_resolved += 1,
        }
    }

    pub fn from_digests<'a>(digests: impl IntoIterator<Item = &'a AlertDigest>) -> Self {
        let mut stats = Self::default();
        for d in digests {
            stats.record(d.status, d.severity);
        }
        stats
    }
}

/// A persisted threshold rule evaluated by the alert engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AlertRuleDef {
    pub id: String,
    pub name: String,
    pub category: AlertCategory,
    pub severity: Severity,
    /// `cpu_usage`, `memory_usage`, `storage_usage`, or a custom metric
    /// backed by `influx_query`
    pub metric_type: String,
    /// One of `>`, `>=`, `<`, `<=`, `==`, `!=`
    pub condition_operator: String,
    pub threshold_value: f64,
    pub check_interval_seconds: u64,
    pub cooldown_seconds: u64,
    pub influx_query: Option<String>,
    pub enabled: bool,
}

/// A row-level change pushed over the realtime feed.
///
/// Both variants carry the full record, never a diff.
///
/// # Examples
///
/// ```
/// use vmdash_common::types::AlertChange;
///
/// let raw = r#"{"type":"DELETE","record":{}}"#;
/// assert!(serde_json::from_str::<AlertChange>(raw).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "record", rename_all = "UPPERCASE")]
pub enum AlertChange {
    Insert(Alert),
    Update(Alert),
}

impl AlertChange {
    pub fn record(&self) -> &Alert {
        match self {
            AlertChange::Insert(alert) | AlertChange::Update(alert) => alert,
        }
    }

    pub fn into_record(self) -> Alert {
        match self {
            AlertChange::Insert(alert) | AlertChange::Update(alert) => alert,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, AlertChange::Insert(_))
    }
}
