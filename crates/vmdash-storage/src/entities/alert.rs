use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub severity: String,
    pub status: String,
    pub category: String,
    pub resource_name: String,
    pub metric_name: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub title: String,
    pub message: String,
    pub alert_rule_id: Option<String>,
    pub triggered_at: DateTimeWithTimeZone,
    pub acknowledged_at: Option<DateTimeWithTimeZone>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
