use serde::{Deserialize, Serialize};
use vmdash_common::types::AlertStatus;

/// A requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Acknowledge,
    Resolve,
    AutoResolve,
}

impl Transition {
    pub fn target(&self) -> AlertStatus {
        match self {
            Transition::Acknowledge => AlertStatus::Acknowledged,
            Transition::Resolve => AlertStatus::Resolved,
            Transition::AutoResolve => AlertStatus::AutoResolved,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Transition::Acknowledge => "acknowledge",
            Transition::Resolve => "resolve",
            Transition::AutoResolve => "auto-resolve",
        }
    }
}

/// Transition rules of the alert state machine.
///
/// ```text
/// active ──acknowledge──▶ acknowledged ──resolve──▶ resolved
///   │ └──────────────────resolve──────────────────▶ resolved
///   └──auto-resolve──▶ auto_resolved ◀──auto-resolve── acknowledged (if enabled)
/// ```
///
/// No rule ever targets `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    /// Whether the evaluator may auto-resolve an alert a human already
    /// acknowledged.
    #[serde(default = "default_auto_resolve_from_acknowledged")]
    pub auto_resolve_from_acknowledged: bool,
}

fn default_auto_resolve_from_acknowledged() -> bool {
    true
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            auto_resolve_from_acknowledged: default_auto_resolve_from_acknowledged(),
        }
    }
}

impl LifecyclePolicy {
    /// Returns the status `transition` leads to from `from`, or `None` when
    /// the transition is not permitted.
    pub fn next(&self, from: AlertStatus, transition: Transition) -> Option<AlertStatus> {
        let allowed = match (from, transition) {
            (AlertStatus::Active, _) => true,
            (AlertStatus::Acknowledged, Transition::Resolve) => true,
            (AlertStatus::Acknowledged, Transition::AutoResolve) => {
                self.auto_resolve_from_acknowledged
            }
            _ => false,
        };
        allowed.then(|| transition.target())
    }

    pub fn allows(&self, from: AlertStatus, transition: Transition) -> bool {
        self.next(from, transition).is_some()
    }
}
