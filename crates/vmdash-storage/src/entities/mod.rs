pub mod alert;
pub mod alert_notification;
pub mod alert_rule;
