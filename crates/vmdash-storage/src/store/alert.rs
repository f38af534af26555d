use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use vmdash_alert::error::Result as AlertResult;
use vmdash_alert::{AlertRepository, StatusChange};
use vmdash_common::types::{
    Alert, AlertCategory, AlertDigest, AlertStats, AlertStatus, Severity,
};

use crate::entities::alert::{self, Column, Entity};
use crate::error::Result;
use crate::store::{parse_column, AlertStore};

/// 告警列表过滤器，所有条件为 AND 关系。
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    /// 为空表示全部状态
    pub statuses: Vec<AlertStatus>,
    pub severity: Option<Severity>,
    pub category: Option<AlertCategory>,
    /// 资源名子串匹配（不区分大小写）
    pub resource_contains: Option<String>,
    pub triggered_from: Option<DateTime<Utc>>,
    pub triggered_to: Option<DateTime<Utc>>,
}

impl AlertFilter {
    fn apply(&self, mut q: Select<Entity>) -> Select<Entity> {
        if !self.statuses.is_empty() {
            q = q.filter(Column::Status.is_in(self.statuses.iter().map(|s| s.as_str())));
        }
        if let Some(sev) = self.severity {
            q = q.filter(Column::Severity.eq(sev.as_str()));
        }
        if let Some(cat) = self.category {
            q = q.filter(Column::Category.eq(cat.as_str()));
        }
        if let Some(ref needle) = self.resource_contains {
            let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
            q = q.filter(
                Expr::expr(Func::lower(Expr::col(Column::ResourceName)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }
        if let Some(from) = self.triggered_from {
            q = q.filter(Column::TriggeredAt.gte(from.fixed_offset()));
        }
        if let Some(to) = self.triggered_to {
            q = q.filter(Column::TriggeredAt.lte(to.fixed_offset()));
        }
        q
    }
}

/// 转义 LIKE 通配符，使子串按字面匹配。
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(crate) fn to_alert(m: alert::Model) -> Result<Alert> {
    Ok(Alert {
        severity: parse_column("alerts.severity", &m.severity)?,
        status: parse_column("alerts.status", &m.status)?,
        category: parse_column("alerts.category", &m.category)?,
        id: m.id,
        resource_name: m.resource_name,
        metric_name: m.metric_name,
        current_value: m.current_value,
        threshold_value: m.threshold_value,
        title: m.title,
        message: m.message,
        triggered_at: m.triggered_at.with_timezone(&Utc),
        alert_rule_id: m.alert_rule_id,
        acknowledged_at: m.acknowledged_at.map(|t| t.with_timezone(&Utc)),
        acknowledged_by: m.acknowledged_by,
        resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
        updated_at: Some(m.updated_at.with_timezone(&Utc)),
    })
}

impl AlertStore {
    pub async fn insert_alert(&self, a: &Alert) -> Result<Alert> {
        let am = alert::ActiveModel {
            id: Set(a.id.clone()),
            severity: Set(a.severity.as_str().to_string()),
            status: Set(a.status.as_str().to_string()),
            category: Set(a.category.as_str().to_string()),
            resource_name: Set(a.resource_name.clone()),
            metric_name: Set(a.metric_name.clone()),
            current_value: Set(a.current_value),
            threshold_value: Set(a.threshold_value),
            title: Set(a.title.clone()),
            message: Set(a.message.clone()),
            alert_rule_id: Set(a.alert_rule_id.clone()),
            triggered_at: Set(a.triggered_at.fixed_offset()),
            acknowledged_at: Set(a.acknowledged_at.map(|t| t.fixed_offset())),
            acknowledged_by: Set(a.acknowledged_by.clone()),
            resolved_at: Set(a.resolved_at.map(|t| t.fixed_offset())),
            updated_at: Set(a.updated_at.unwrap_or(a.triggered_at).fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        to_alert(model)
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        Entity::find_by_id(id)
            .one(self.db())
            .await?
            .map(to_alert)
            .transpose()
    }

    /// 按 `triggered_at` 倒序分页查询。
    pub async fn query_alerts(
        &self,
        filter: &AlertFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Alert>> {
        let rows = filter
            .apply(Entity::find())
            .order_by(Column::TriggeredAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_alert).collect()
    }

    pub async fn count_alerts(&self, filter: &AlertFilter) -> Result<u64> {
        Ok(filter.apply(Entity::find()).count(self.db()).await?)
    }

    /// 全量 `(id, status, severity)` 摘要，用于客户端统计索引。
    pub async fn alert_digests(&self) -> Result<Vec<AlertDigest>> {
        let rows: Vec<(String, String, String)> = Entity::find()
            .select_only()
            .column(Column::Id)
            .column(Column::Status)
            .column(Column::Severity)
            .into_tuple()
            .all(self.db())
            .await?;
        rows.into_iter()
            .map(|(id, status, severity)| {
                Ok(AlertDigest {
                    id,
                    status: parse_column("alerts.status", &status)?,
                    severity: parse_column("alerts.severity", &severity)?,
                })
            })
            .collect()
    }

    /// 全表统计。`by_severity` 只统计 `active` 告警。
    pub async fn alert_stats(&self) -> Result<AlertStats> {
        let rows: Vec<(String, String, i64)> = Entity::find()
            .select_only()
            .column(Column::Status)
            .column(Column::Severity)
            .column_as(Expr::col(Column::Id).count(), "cnt")
            .group_by(Column::Status)
            .group_by(Column::Severity)
            .into_tuple()
            .all(self.db())
            .await?;

        let mut stats = AlertStats::default();
        for (status, severity, cnt) in rows {
            let n = cnt.max(0) as u64;
            match parse_column::<AlertStatus>("alerts.status", &status)? {
                AlertStatus::Active => {
                    stats.total_active += n;
                    match parse_column::<Severity>("alerts.severity", &severity)? {
                        Severity::Low => stats.by_severity.low += n,
                        Severity::Medium => stats.by_severity.medium += n,
                        Severity::High => stats.by_severity.high += n,
                    }
                }
                AlertStatus::Acknowledged => stats.total_acknowledged += n,
                AlertStatus::Resolved => stats.total_resolved += n,
                AlertStatus::AutoResolved => stats.total_auto_resolved += n,
            }
        }
        Ok(stats)
    }

    /// 条件更新：仅当当前状态仍为 `expected` 时写入，返回更新后的记录。
    pub async fn transition_alert(
        &self,
        id: &str,
        expected: AlertStatus,
        change: &StatusChange,
    ) -> Result<Option<Alert>> {
        let at = change.at.fixed_offset();
        let mut update = Entity::update_many()
            .col_expr(Column::Status, Expr::value(change.to.as_str()))
            .col_expr(Column::UpdatedAt, Expr::value(at));
        match change.to {
            AlertStatus::Acknowledged => {
                update = update
                    .col_expr(Column::AcknowledgedAt, Expr::value(Some(at)))
                    .col_expr(Column::AcknowledgedBy, Expr::value(change.actor.clone()));
            }
            AlertStatus::Resolved | AlertStatus::AutoResolved => {
                update = update.col_expr(Column::ResolvedAt, Expr::value(Some(at)));
            }
            AlertStatus::Active => {}
        }

        let res = update
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(expected.as_str()))
            .exec(self.db())
            .await?;
        if res.rows_affected == 0 {
            return Ok(None);
        }
        self.get_alert(id).await
    }

    /// 刷新仍处于打开状态的告警的 `current_value`。
    pub async fn refresh_alert_value(
        &self,
        id: &str,
        current_value: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let res = Entity::update_many()
            .col_expr(Column::CurrentValue, Expr::value(current_value))
            .col_expr(Column::UpdatedAt, Expr::value(at.fixed_offset()))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.is_in(open_statuses()))
            .exec(self.db())
            .await?;
        if res.rows_affected == 0 {
            return Ok(None);
        }
        self.get_alert(id).await
    }

    pub async fn find_open_alert(
        &self,
        resource_name: &str,
        metric_name: &str,
        category: AlertCategory,
    ) -> Result<Option<Alert>> {
        Entity::find()
            .filter(Column::ResourceName.eq(resource_name))
            .filter(Column::MetricName.eq(metric_name))
            .filter(Column::Category.eq(category.as_str()))
            .filter(Column::Status.is_in(open_statuses()))
            .order_by(Column::TriggeredAt, Order::Desc)
            .one(self.db())
            .await?
            .map(to_alert)
            .transpose()
    }

    pub async fn find_open_alerts_by_rule(
        &self,
        rule_id: &str,
        resource_name: &str,
    ) -> Result<Vec<Alert>> {
        let rows = Entity::find()
            .filter(Column::AlertRuleId.eq(rule_id))
            .filter(Column::ResourceName.eq(resource_name))
            .filter(Column::Status.is_in(open_statuses()))
            .order_by(Column::TriggeredAt, Order::Desc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_alert).collect()
    }
}

fn open_statuses() -> [&'static str; 2] {
    [AlertStatus::Active.as_str(), AlertStatus::Acknowledged.as_str()]
}

#[async_trait]
impl AlertRepository for AlertStore {
    async fn get(&self, id: &str) -> AlertResult<Option<Alert>> {
        Ok(self.get_alert(id).await?)
    }

    async fn insert(&self, alert: &Alert) -> AlertResult<Alert> {
        Ok(self.insert_alert(alert).await?)
    }

    async fn transition(
        &self,
        id: &str,
        expected: AlertStatus,
        change: &StatusChange,
    ) -> AlertResult<Option<Alert>> {
        Ok(self.transition_alert(id, expected, change).await?)
    }

    async fn refresh_value(
        &self,
        id: &str,
        current_value: f64,
        at: DateTime<Utc>,
    ) -> AlertResult<Option<Alert>> {
        Ok(self.refresh_alert_value(id, current_value, at).await?)
    }

    async fn find_open(
        &self,
        resource_name: &str,
        metric_name: &str,
        category: AlertCategory,
    ) -> AlertResult<Option<Alert>> {
        Ok(self.find_open_alert(resource_name, metric_name, category).await?)
    }

    async fn find_open_by_rule(
        &self,
        rule_id: &str,
        resource_name: &str,
    ) -> AlertResult<Vec<Alert>> {
        Ok(self.find_open_alerts_by_rule(rule_id, resource_name).await?)
    }

    async fn digests(&self) -> AlertResult<Vec<AlertDigest>> {
        Ok(self.alert_digests().await?)
    }
}
