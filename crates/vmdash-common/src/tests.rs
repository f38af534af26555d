use crate::types::{Alert, AlertCategory, AlertStatus, Severity};
use chrono::Utc;
use std::collections::HashSet;

fn sample_alert() -> Alert {
    Alert {
        id: "1".into(),
        severity: Severity::High,
        status: AlertStatus::Active,
        category: AlertCategory::NodeHealth,
        resource_name: "node-a".into(),
        metric_name: "cpu".into(),
        current_value: 95.2,
        threshold_value: 90.0,
        title: "HIGH: Cpu alert on node-a".into(),
        message: "Cpu is 95.2%".into(),
        triggered_at: Utc::now(),
        alert_rule_id: None,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        updated_at: None,
    }
}

#[test]
fn status_open_and_terminal_partition() {
    let open: Vec<_> = AlertStatus::ALL.iter().filter(|s| s.is_open()).collect();
    assert_eq!(open, vec![&AlertStatus::Active, &AlertStatus::Acknowledged]);
    assert!(AlertStatus::Resolved.is_terminal());
    assert!(AlertStatus::AutoResolved.is_terminal());
}

#[test]
fn status_round_trips_through_str() {
    for status in AlertStatus::ALL {
        assert_eq!(status.as_str().parse::<AlertStatus>(), Ok(status));
    }
    assert!("closed".parse::<AlertStatus>().is_err());
}

#[test]
fn alert_serializes_with_wire_field_names() {
    let value = serde_json::to_value(sample_alert()).unwrap();
    assert_eq!(value["severity"], "high");
    assert_eq!(value["status"], "active");
    assert_eq!(value["category"], "node_health");
    assert_eq!(value["resource_name"], "node-a");
    assert_eq!(value["current_value"], 95.2);
    assert!(value["triggered_at"].is_string());
}

#[test]
fn alert_deserializes_without_optional_fields() {
    let raw = serde_json::json!({
        "id": "7",
        "severity": "low",
        "status": "auto_resolved",
        "category": "vm_resource",
        "resource_name": "vm-101",
        "metric_name": "memory_usage",
        "current_value": 12.0,
        "threshold_value": 80.0,
        "title": "t",
        "message": "m",
        "triggered_at": "2024-05-01T10:00:00Z"
    });
    let alert: Alert = serde_json::from_value(raw).unwrap();
    assert_eq!(alert.status, AlertStatus::AutoResolved);
    assert!(alert.acknowledged_by.is_none());
}

#[test]
fn next_id_returns_unique_numeric_ids() {
    crate::id::init(1, 1);
    let mut ids = HashSet::new();
    for _ in 0..1000 {
        let id = crate::id::next_id();
        assert!(id.parse::<i64>().is_ok());
        assert!(ids.insert(id), "Duplicate ID generated");
    }
}

#[test]
fn change_frame_carries_full_record() {
    use crate::types::AlertChange;

    let change = AlertChange::Update(sample_alert());
    let value = serde_json::to_value(&change).unwrap();
    assert_eq!(value["type"], "UPDATE");
    assert_eq!(value["record"]["id"], "1");
    assert_eq!(value["record"]["threshold_value"], 90.0);

    let back: AlertChange = serde_json::from_value(value).unwrap();
    assert!(!back.is_insert());
    assert_eq!(back.record().resource_name, "node-a");
}
