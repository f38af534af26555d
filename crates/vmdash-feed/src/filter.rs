use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vmdash_common::types::{Alert, AlertCategory, AlertStatus, Severity};

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;

/// A viewer's local filter. All set conditions must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewFilter {
    /// Empty means every status.
    #[serde(default)]
    pub statuses: Vec<AlertStatus>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub category: Option<AlertCategory>,
    /// Case-insensitive substring of `resource_name`.
    #[serde(default)]
    pub resource_contains: Option<String>,
    #[serde(default)]
    pub triggered_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub triggered_to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

impl Default for ViewFilter {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            severity: None,
            category: None,
            resource_contains: None,
            triggered_from: None,
            triggered_to: None,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ViewFilter {
    /// Only open (`active` or `acknowledged`) alerts.
    pub fn open() -> Self {
        Self {
            statuses: vec![AlertStatus::Active, AlertStatus::Acknowledged],
            ..Self::default()
        }
    }

    pub fn page_limit(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&alert.status) {
            return false;
        }
        if self.severity.is_some_and(|s| s != alert.severity) {
            return false;
        }
        if self.category.is_some_and(|c| c != alert.category) {
            return false;
        }
        if let Some(ref needle) = self.resource_contains {
            if !alert
                .resource_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if self.triggered_from.is_some_and(|from| alert.triggered_at < from) {
            return false;
        }
        if self.triggered_to.is_some_and(|to| alert.triggered_at > to) {
            return false;
        }
        true
    }

    /// Query parameters understood by `GET /v1/alerts`.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.statuses.is_empty() {
            let joined = self
                .statuses
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("status", joined));
        }
        if let Some(sev) = self.severity {
            pairs.push(("severity", sev.as_str().to_string()));
        }
        if let Some(cat) = self.category {
            pairs.push(("category", cat.as_str().to_string()));
        }
        if let Some(ref r) = self.resource_contains {
            pairs.push(("resource_name", r.clone()));
        }
        if let Some(from) = self.triggered_from {
            pairs.push(("start", from.to_rfc3339()));
        }
        if let Some(to) = self.triggered_to {
            pairs.push(("end", to.to_rfc3339()));
        }
        pairs.push(("limit", self.page_limit().to_string()));
        pairs.push(("offset", "0".to_string()));
        pairs
    }
}
