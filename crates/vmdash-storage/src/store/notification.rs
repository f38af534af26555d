use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entities::alert_notification::{self, Column, Entity};
use crate::error::Result;
use crate::store::AlertStore;

/// 告警通知投递日志（来自 alert_notifications 表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLogRow {
    pub id: String,
    pub alert_id: String,
    pub recipient: String,
    pub channel: String,
    /// `sent` 或 `failed`
    pub status: String,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

fn to_row(m: alert_notification::Model) -> NotificationLogRow {
    NotificationLogRow {
        id: m.id,
        alert_id: m.alert_id,
        recipient: m.recipient,
        channel: m.channel,
        status: m.status,
        error: m.error,
        sent_at: m.sent_at.with_timezone(&Utc),
    }
}

impl AlertStore {
    pub async fn insert_notification_log(&self, row: &NotificationLogRow) -> Result<()> {
        let am = alert_notification::ActiveModel {
            id: Set(row.id.clone()),
            alert_id: Set(row.alert_id.clone()),
            recipient: Set(row.recipient.clone()),
            channel: Set(row.channel.clone()),
            status: Set(row.status.clone()),
            error: Set(row.error.clone()),
            sent_at: Set(row.sent_at.fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    pub async fn list_notification_logs(&self, alert_id: &str) -> Result<Vec<NotificationLogRow>> {
        let rows = Entity::find()
            .filter(Column::AlertId.eq(alert_id))
            .order_by(Column::SentAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }
}
