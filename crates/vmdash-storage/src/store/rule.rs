use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use vmdash_common::types::AlertRuleDef;

use crate::entities::alert_rule::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::{parse_column, AlertStore};

fn to_rule(m: alert_rule::Model) -> Result<AlertRuleDef> {
    Ok(AlertRuleDef {
        category: parse_column("alert_rules.category", &m.category)?,
        severity: parse_column("alert_rules.severity", &m.severity)?,
        id: m.id,
        name: m.name,
        metric_type: m.metric_type,
        condition_operator: m.condition_operator,
        threshold_value: m.threshold_value,
        check_interval_seconds: m.check_interval_seconds.max(0) as u64,
        cooldown_seconds: m.cooldown_seconds.max(0) as u64,
        influx_query: m.influx_query,
        enabled: m.enabled,
    })
}

/// 超出 i64 的秒数按上限存储。
fn to_db_secs(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

impl AlertStore {
    pub async fn insert_alert_rule(&self, rule: &AlertRuleDef) -> Result<AlertRuleDef> {
        let now = Utc::now().fixed_offset();
        let am = alert_rule::ActiveModel {
            id: Set(rule.id.clone()),
            name: Set(rule.name.clone()),
            category: Set(rule.category.as_str().to_string()),
            severity: Set(rule.severity.as_str().to_string()),
            metric_type: Set(rule.metric_type.clone()),
            condition_operator: Set(rule.condition_operator.clone()),
            threshold_value: Set(rule.threshold_value),
            check_interval_seconds: Set(to_db_secs(rule.check_interval_seconds)),
            cooldown_seconds: Set(to_db_secs(rule.cooldown_seconds)),
            influx_query: Set(rule.influx_query.clone()),
            enabled: Set(rule.enabled),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_rule(model)
    }

    pub async fn get_alert_rule(&self, id: &str) -> Result<Option<AlertRuleDef>> {
        Entity::find_by_id(id)
            .one(self.db())
            .await?
            .map(to_rule)
            .transpose()
    }

    /// 按 id 插入或覆盖规则，返回是否为新建。
    pub async fn upsert_alert_rule(&self, rule: &AlertRuleDef) -> Result<bool> {
        let Some(existing) = Entity::find_by_id(rule.id.as_str()).one(self.db()).await? else {
            self.insert_alert_rule(rule).await?;
            return Ok(true);
        };
        let mut am: alert_rule::ActiveModel = existing.into();
        am.name = Set(rule.name.clone());
        am.category = Set(rule.category.as_str().to_string());
        am.severity = Set(rule.severity.as_str().to_string());
        am.metric_type = Set(rule.metric_type.clone());
        am.condition_operator = Set(rule.condition_operator.clone());
        am.threshold_value = Set(rule.threshold_value);
        am.check_interval_seconds = Set(to_db_secs(rule.check_interval_seconds));
        am.cooldown_seconds = Set(to_db_secs(rule.cooldown_seconds));
        am.influx_query = Set(rule.influx_query.clone());
        am.enabled = Set(rule.enabled);
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(false)
    }

    pub async fn set_alert_rule_enabled(&self, id: &str, enabled: bool) -> Result<AlertRuleDef> {
        let model = Entity::find_by_id(id)
            .one(self.db())
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "alert_rule",
                id: id.to_string(),
            })?;
        let mut am: alert_rule::ActiveModel = model.into();
        am.enabled = Set(enabled);
        am.updated_at = Set(Utc::now().fixed_offset());
        to_rule(am.update(self.db()).await?)
    }

    pub async fn list_alert_rules(&self) -> Result<Vec<AlertRuleDef>> {
        let rows = Entity::find()
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_rule).collect()
    }

    pub async fn list_enabled_alert_rules(&self) -> Result<Vec<AlertRuleDef>> {
        let rows = Entity::find()
            .filter(Column::Enabled.eq(true))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_rule).collect()
    }
}
