use crate::policy::AlertDraft;
use crate::rules::AlertRule;
use crate::MetricReading;
use vmdash_common::types::{AlertCategory, AlertRuleDef, Severity};
use std::str::FromStr;

/// Tolerance used by `==` and `!=`.
const EQ_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Equal,
    NotEqual,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" | "gt" => Ok(Self::GreaterThan),
            ">=" | "gte" => Ok(Self::GreaterEqual),
            "<" | "lt" => Ok(Self::LessThan),
            "<=" | "lte" => Ok(Self::LessEqual),
            "==" | "eq" => Ok(Self::Equal),
            "!=" | "ne" => Ok(Self::NotEqual),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        };
        f.write_str(s)
    }
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::GreaterEqual => value >= threshold,
            Self::LessThan => value < threshold,
            Self::LessEqual => value <= threshold,
            Self::Equal => (value - threshold).abs() < EQ_TOLERANCE,
            Self::NotEqual => (value - threshold).abs() >= EQ_TOLERANCE,
        }
    }
}

/// Compares the latest reading of a resource against a fixed threshold.
#[derive(Debug, Clone)]
pub struct ThresholdRule {
    pub id: String,
    pub name: String,
    pub metric: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub operator: CompareOp,
    pub value: f64,
    pub cooldown_secs: u64,
}

impl TryFrom<&AlertRuleDef> for ThresholdRule {
    type Error = String;

    fn try_from(def: &AlertRuleDef) -> Result<Self, Self::Error> {
        Ok(Self {
            id: def.id.clone(),
            name: def.name.clone(),
            metric: def.metric_type.clone(),
            category: def.category,
            severity: def.severity,
            operator: def.condition_operator.parse()?,
            value: def.threshold_value,
            cooldown_secs: def.cooldown_seconds,
        })
    }
}

impl AlertRule for ThresholdRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> &str {
        &self.metric
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    fn is_breached(&self, reading: &MetricReading) -> bool {
        self.operator.check(reading.value, self.value)
    }

    fn draft(&self, reading: &MetricReading) -> AlertDraft {
        let display = metric_display(&self.metric);
        AlertDraft {
            severity: self.severity,
            category: self.category,
            resource_name: reading.resource_name.clone(),
            metric_name: self.metric.clone(),
            current_value: reading.value,
            threshold_value: self.value,
            title: format!(
                "{}: {} alert on {}",
                self.severity.as_str().to_uppercase(),
                display,
                reading.resource_name
            ),
            message: format!(
                "{} is {:.1}%, which exceeds the threshold of {}%. Please investigate the {} node.",
                display, reading.value, self.value, reading.resource_name
            ),
            alert_rule_id: Some(self.id.clone()),
        }
    }
}

/// `"cpu_usage"` -> `"Cpu Usage"`.
pub fn metric_display(metric: &str) -> String {
    metric
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
