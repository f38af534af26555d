//! Alert lifecycle and evaluation.
//!
//! [`manager::AlertManager`] owns the state machine in [`lifecycle`]: it reads
//! an alert through an [`AlertRepository`], decides whether the requested
//! transition is legal, applies it as a compare-and-set and publishes the
//! full updated record through a [`ChangePublisher`].
//!
//! [`engine::AlertEngine`] turns metric readings into raise/clear actions for
//! threshold rules, and [`evaluator::Evaluator`] drives it against a
//! [`MetricSource`].

pub mod cooldown;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod lifecycle;
pub mod manager;
pub mod memory;
pub mod policy;
pub mod rules;
pub mod session;


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vmdash_common::types::{Alert, AlertCategory, AlertChange, AlertDigest, AlertRuleDef, AlertStatus};

use crate::error::Result;

/// A status change to persist, already validated by the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub to: AlertStatus,
    pub at: DateTime<Utc>,
    /// User id recorded as `acknowledged_by` when `to` is `Acknowledged`.
    pub actor: Option<String>,
}

/// Persistence backend for alert records.
///
/// Implementations must make [`AlertRepository::transition`] atomic: the
/// change is applied only while the stored status still equals `expected`.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Alert>>;

    /// Inserts a new alert and returns the stored record.
    async fn insert(&self, alert: &Alert) -> Result<Alert>;

    /// Applies `change` if the current status equals `expected`. Returns
    /// `None` when the record is missing or its status moved on.
    async fn transition(
        &self,
        id: &str,
        expected: AlertStatus,
        change: &StatusChange,
    ) -> Result<Option<Alert>>;

    /// Overwrites `current_value` while the alert is still open. Returns
    /// `None` if the alert is missing or already closed.
    async fn refresh_value(
        &self,
        id: &str,
        current_value: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>>;

    /// Finds the open alert for a `(resource_name, metric_name, category)`
    /// tuple, newest first.
    async fn find_open(
        &self,
        resource_name: &str,
        metric_name: &str,
        category: AlertCategory,
    ) -> Result<Option<Alert>>;

    /// Lists open alerts raised by `rule_id` for `resource_name`, newest first.
    async fn find_open_by_rule(&self, rule_id: &str, resource_name: &str) -> Result<Vec<Alert>>;

    /// Status and severity of every alert in the collection.
    async fn digests(&self) -> Result<Vec<AlertDigest>>;
}

/// Receives every insert/update produced by the lifecycle.
pub trait ChangePublisher: Send + Sync {
    fn publish(&self, change: AlertChange);
}

/// Publisher that drops every change.
pub struct NoopPublisher;

impl ChangePublisher for NoopPublisher {
    fn publish(&self, _change: AlertChange) {}
}

/// One measured value for a monitored resource.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub resource_name: String,
    pub value: f64,
}

impl MetricReading {
    pub fn new(resource_name: impl Into<String>, value: f64) -> Self {
        Self {
            resource_name: resource_name.into(),
            value,
        }
    }
}

/// Source of current metric readings for a rule, one per resource.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn sample(&self, rule: &AlertRuleDef) -> anyhow::Result<Vec<MetricReading>>;
}
