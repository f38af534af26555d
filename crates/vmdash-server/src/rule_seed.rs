use anyhow::Context;
use std::collections::HashSet;
use vmdash_common::types::{AlertCategory, AlertRuleDef, Severity};
use vmdash_storage::AlertStore;

use crate::config::{RulesSeedFile, SeedAlertRule};

/// 首次启动时写入的默认规则。
struct RuleDef {
    name: &'static str,
    severity: Severity,
    metric_type: &'static str,
    threshold: f64,
}

const DEFAULT_RULES: &[RuleDef] = &[
    // ---- CPU ----
    RuleDef {
        name: "High CPU Usage",
        severity: Severity::High,
        metric_type: "cpu_usage",
        threshold: 90.0,
    },
    RuleDef {
        name: "Elevated CPU Usage",
        severity: Severity::Medium,
        metric_type: "cpu_usage",
        threshold: 80.0,
    },
    // ---- Memory ----
    RuleDef {
        name: "High Memory Usage",
        severity: Severity::High,
        metric_type: "memory_usage",
        threshold: 90.0,
    },
    RuleDef {
        name: "Elevated Memory Usage",
        severity: Severity::Medium,
        metric_type: "memory_usage",
        threshold: 80.0,
    },
    // ---- Storage ----
    RuleDef {
        name: "High Storage Usage",
        severity: Severity::High,
        metric_type: "storage_usage",
        threshold: 90.0,
    },
    RuleDef {
        name: "Elevated Storage Usage",
        severity: Severity::Medium,
        metric_type: "storage_usage",
        threshold: 80.0,
    },
];

/// 规则表为空时写入默认规则，返回写入条数。
pub async fn init_default_rules(store: &AlertStore) -> anyhow::Result<usize> {
    let existing = store.list_alert_rules().await?;
    if !existing.is_empty() {
        tracing::debug!(count = existing.len(), "Alert rules exist, skipping default seed");
        return Ok(0);
    }

    let mut inserted = 0;
    for def in DEFAULT_RULES {
        let rule = AlertRuleDef {
            id: vmdash_common::id::next_id(),
            name: def.name.to_string(),
            category: AlertCategory::NodeHealth,
            severity: def.severity,
            metric_type: def.metric_type.to_string(),
            condition_operator: ">".to_string(),
            threshold_value: def.threshold,
            check_interval_seconds: 60,
            cooldown_seconds: 300,
            influx_query: None,
            enabled: true,
        };
        match store.insert_alert_rule(&rule).await {
            Ok(_) => {
                inserted += 1;
                tracing::info!(name = %def.name, metric = %def.metric_type, "Seeded alert rule");
            }
            Err(e) => {
                tracing::warn!(name = %def.name, error = %e, "Failed to seed alert rule");
            }
        }
    }

    tracing::info!(
        inserted,
        total = DEFAULT_RULES.len(),
        "Default alert rules initialized"
    );
    Ok(inserted)
}

impl SeedAlertRule {
    pub fn to_rule(&self, id: String) -> AlertRuleDef {
        AlertRuleDef {
            id,
            name: self.name.clone(),
            category: self.category,
            severity: self.severity,
            metric_type: self.metric_type.clone(),
            condition_operator: self.condition_operator.clone(),
            threshold_value: self.threshold_value,
            check_interval_seconds: self.check_interval_seconds,
            cooldown_seconds: self.cooldown_seconds,
            influx_query: self.influx_query.clone(),
            enabled: self.enabled,
        }
    }
}

/// 从 JSON 种子文件导入规则，按名称去重。返回 `(created, skipped)`。
pub async fn init_from_seed_file(store: &AlertStore, seed_path: &str) -> anyhow::Result<(u32, u32)> {
    let content = std::fs::read_to_string(seed_path)
        .with_context(|| format!("Failed to read seed file '{seed_path}'"))?;
    let seed: RulesSeedFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse seed file '{seed_path}'"))?;

    let existing_names: HashSet<String> = store
        .list_alert_rules()
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();

    let mut created = 0u32;
    let mut skipped = 0u32;
    for r in &seed.rules {
        if existing_names.contains(&r.name) {
            tracing::warn!(name = %r.name, "Alert rule already exists, skipping");
            skipped += 1;
            continue;
        }
        match store
            .insert_alert_rule(&r.to_rule(vmdash_common::id::next_id()))
            .await
        {
            Ok(rule) => {
                tracing::info!(name = %r.name, id = %rule.id, "Alert rule created");
                created += 1;
            }
            Err(e) => {
                tracing::error!(name = %r.name, error = %e, "Failed to create alert rule");
            }
        }
    }

    tracing::info!(created, skipped, "init-rules completed");
    Ok((created, skipped))
}
