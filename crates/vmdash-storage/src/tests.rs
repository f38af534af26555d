use crate::store::redact_url;
use crate::{AlertFilter, AlertStore, NotificationLogRow};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use vmdash_alert::error::AlertError;
use vmdash_alert::manager::AlertManager;
use vmdash_alert::policy::{AlertDraft, CreateOutcome};
use vmdash_alert::session::Session;
use vmdash_alert::{AlertRepository, NoopPublisher, StatusChange};
use vmdash_common::types::{
    Alert, AlertCategory, AlertRuleDef, AlertStatus, Severity,
};

async fn setup() -> (TempDir, Arc<AlertStore>) {
    vmdash_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("vmdash.db").display());
    let store = AlertStore::new(&url).await.unwrap();
    (dir, Arc::new(store))
}

fn make_alert(resource: &str, severity: Severity, mins_ago: i64) -> Alert {
    let ts = Utc::now() - Duration::minutes(mins_ago);
    Alert {
        id: vmdash_common::id::next_id(),
        severity,
        status: AlertStatus::Active,
        category: AlertCategory::NodeHealth,
        resource_name: resource.to_string(),
        metric_name: "cpu_usage".to_string(),
        current_value: 95.2,
        threshold_value: 90.0,
        title: format!("HIGH: Cpu Usage alert on {resource}"),
        message: "Cpu Usage is 95.2%".to_string(),
        triggered_at: ts,
        alert_rule_id: Some("rule-cpu".to_string()),
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        updated_at: Some(ts),
    }
}

fn make_rule(id: &str, name: &str, enabled: bool) -> AlertRuleDef {
    AlertRuleDef {
        id: id.to_string(),
        name: name.to_string(),
        category: AlertCategory::NodeHealth,
        severity: Severity::High,
        metric_type: "cpu_usage".to_string(),
        condition_operator: ">".to_string(),
        threshold_value: 90.0,
        check_interval_seconds: 60,
        cooldown_seconds: 300,
        influx_query: None,
        enabled,
    }
}

#[tokio::test]
async fn insert_and_get_alert() {
    let (_dir, store) = setup().await;
    let alert = make_alert("node-a", Severity::High, 0);
    let stored = store.insert_alert(&alert).await.unwrap();
    assert_eq!(stored.id, alert.id);
    assert_eq!(stored.status, AlertStatus::Active);

    let fetched = store.get_alert(&alert.id).await.unwrap().unwrap();
    assert_eq!(fetched.resource_name, "node-a");
    assert_eq!(fetched.alert_rule_id.as_deref(), Some("rule-cpu"));
    assert!(store.get_alert("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn query_orders_newest_first_and_filters() {
    let (_dir, store) = setup().await;
    store.insert_alert(&make_alert("node-a", Severity::High, 30)).await.unwrap();
    store.insert_alert(&make_alert("Node-B", Severity::Low, 10)).await.unwrap();
    store.insert_alert(&make_alert("vm-100", Severity::Medium, 20)).await.unwrap();

    let all = store.query_alerts(&AlertFilter::default(), 50, 0).await.unwrap();
    let names: Vec<_> = all.iter().map(|a| a.resource_name.as_str()).collect();
    assert_eq!(names, vec!["Node-B", "vm-100", "node-a"]);

    let nodes = AlertFilter {
        resource_contains: Some("NODE".into()),
        ..Default::default()
    };
    assert_eq!(store.count_alerts(&nodes).await.unwrap(), 2);

    let high = AlertFilter {
        severity: Some(Severity::High),
        ..Default::default()
    };
    let rows = store.query_alerts(&high, 50, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource_name, "node-a");

    let recent = AlertFilter {
        triggered_from: Some(Utc::now() - Duration::minutes(15)),
        ..Default::default()
    };
    assert_eq!(store.count_alerts(&recent).await.unwrap(), 1);

    let page = store.query_alerts(&AlertFilter::default(), 1, 1).await.unwrap();
    assert_eq!(page[0].resource_name, "vm-100");
}

#[tokio::test]
async fn transition_is_compare_and_set() {
    let (_dir, store) = setup().await;
    let alert = store.insert_alert(&make_alert("node-a", Severity::High, 0)).await.unwrap();

    let ack = StatusChange {
        to: AlertStatus::Acknowledged,
        at: Utc::now(),
        actor: Some("user-1".into()),
    };
    let updated = store
        .transition_alert(&alert.id, AlertStatus::Active, &ack)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, AlertStatus::Acknowledged);
    assert_eq!(updated.acknowledged_by.as_deref(), Some("user-1"));
    assert!(updated.acknowledged_at.is_some());

    // Stale expectation: nothing changes.
    let again = store
        .transition_alert(&alert.id, AlertStatus::Active, &ack)
        .await
        .unwrap();
    assert!(again.is_none());

    let resolve = StatusChange {
        to: AlertStatus::Resolved,
        at: Utc::now(),
        actor: None,
    };
    let resolved = store
        .transition_alert(&alert.id, AlertStatus::Acknowledged, &resolve)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);
    assert!(resolved.resolved_at.is_some());
    assert_eq!(resolved.acknowledged_by.as_deref(), Some("user-1"));
}

#[tokio::test]
async fn refresh_only_touches_open_alerts() {
    let (_dir, store) = setup().await;
    let alert = store.insert_alert(&make_alert("node-a", Severity::High, 0)).await.unwrap();

    let refreshed = store
        .refresh_alert_value(&alert.id, 98.1, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.current_value, 98.1);

    let found = store
        .find_open_alert("node-a", "cpu_usage", AlertCategory::NodeHealth)
        .await
        .unwrap();
    assert_eq!(found.map(|a| a.id), Some(alert.id.clone()));

    let close = StatusChange {
        to: AlertStatus::AutoResolved,
        at: Utc::now(),
        actor: None,
    };
    store
        .transition_alert(&alert.id, AlertStatus::Active, &close)
        .await
        .unwrap();
    assert!(store
        .refresh_alert_value(&alert.id, 99.0, Utc::now())
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_open_alert("node-a", "cpu_usage", AlertCategory::NodeHealth)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_open_alerts_by_rule("rule-cpu", "node-a")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn stats_count_active_by_severity() {
    let (_dir, store) = setup().await;
    let a = store.insert_alert(&make_alert("node-a", Severity::High, 0)).await.unwrap();
    store.insert_alert(&make_alert("node-b", Severity::High, 0)).await.unwrap();
    store.insert_alert(&make_alert("node-c", Severity::Low, 0)).await.unwrap();

    let ack = StatusChange {
        to: AlertStatus::Acknowledged,
        at: Utc::now(),
        actor: Some("user-1".into()),
    };
    store.transition_alert(&a.id, AlertStatus::Active, &ack).await.unwrap();

    let stats = store.alert_stats().await.unwrap();
    assert_eq!(stats.total_active, 2);
    assert_eq!(stats.total_acknowledged, 1);
    assert_eq!(stats.by_severity.high, 1);
    assert_eq!(stats.by_severity.low, 1);
    assert_eq!(stats.by_severity.medium, 0);

    let digests = store.alert_digests().await.unwrap();
    assert_eq!(digests.len(), 3);
    assert_eq!(vmdash_common::types::AlertStats::from_digests(digests.iter()), stats);
}

#[tokio::test]
async fn manager_over_store_rejects_acknowledging_resolved() {
    let (_dir, store) = setup().await;
    let manager = AlertManager::new(store.clone(), Arc::new(NoopPublisher));
    let draft = AlertDraft {
        severity: Severity::High,
        category: AlertCategory::NodeHealth,
        resource_name: "node-a".into(),
        metric_name: "cpu_usage".into(),
        current_value: 95.2,
        threshold_value: 90.0,
        title: "HIGH: Cpu Usage alert on node-a".into(),
        message: "Cpu Usage is 95.2%".into(),
        alert_rule_id: None,
    };
    let CreateOutcome::Inserted(alert) = manager.create(draft.clone()).await.unwrap() else {
        panic!("expected insert");
    };
    let CreateOutcome::Refreshed(again) = manager.create(draft).await.unwrap() else {
        panic!("expected refresh");
    };
    assert_eq!(again.id, alert.id);

    let session = Session::new("user-1", None);
    manager.resolve(&session, &alert.id).await.unwrap();
    let err = manager.acknowledge(&session, &alert.id).await.unwrap_err();
    assert!(matches!(err, AlertError::InvalidTransition { from: AlertStatus::Resolved, .. }));

    let stored = store.get(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Resolved);
    assert!(stored.acknowledged_at.is_none());
}

#[tokio::test]
async fn rule_upsert_and_enabled_listing() {
    let (_dir, store) = setup().await;
    assert!(store.upsert_alert_rule(&make_rule("r1", "Node CPU high", true)).await.unwrap());
    assert!(store.upsert_alert_rule(&make_rule("r2", "Node memory high", false)).await.unwrap());

    let mut changed = make_rule("r1", "Node CPU high", true);
    changed.threshold_value = 85.0;
    assert!(!store.upsert_alert_rule(&changed).await.unwrap());

    let rule = store.get_alert_rule("r1").await.unwrap().unwrap();
    assert_eq!(rule.threshold_value, 85.0);

    let enabled = store.list_enabled_alert_rules().await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].id, "r1");
    assert_eq!(store.list_alert_rules().await.unwrap().len(), 2);

    store.set_alert_rule_enabled("r2", true).await.unwrap();
    assert_eq!(store.list_enabled_alert_rules().await.unwrap().len(), 2);
    assert!(store.set_alert_rule_enabled("nope", true).await.is_err());
}

#[tokio::test]
async fn resource_filter_treats_wildcards_literally() {
    let (_dir, store) = setup().await;
    store.insert_alert(&make_alert("node_1", Severity::High, 3)).await.unwrap();
    store.insert_alert(&make_alert("nodeX1", Severity::High, 2)).await.unwrap();
    store.insert_alert(&make_alert("pve-100%", Severity::Low, 1)).await.unwrap();
    store.insert_alert(&make_alert("pve-1000", Severity::Low, 0)).await.unwrap();

    let underscore = AlertFilter {
        resource_contains: Some("node_1".into()),
        ..Default::default()
    };
    let rows = store.query_alerts(&underscore, 50, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource_name, "node_1");

    let percent = AlertFilter {
        resource_contains: Some("100%".into()),
        ..Default::default()
    };
    assert_eq!(store.count_alerts(&percent).await.unwrap(), 1);
}

#[tokio::test]
async fn oversized_rule_seconds_are_clamped() {
    let (_dir, store) = setup().await;
    let mut rule = make_rule("r-big", "Huge cooldown", true);
    rule.cooldown_seconds = u64::MAX;
    store.insert_alert_rule(&rule).await.unwrap();

    let stored = store.get_alert_rule("r-big").await.unwrap().unwrap();
    assert_eq!(stored.cooldown_seconds, i64::MAX as u64);
    assert_eq!(stored.check_interval_seconds, 60);
}

#[tokio::test]
async fn notification_log_round_trip() {
    let (_dir, store) = setup().await;
    let row = NotificationLogRow {
        id: vmdash_common::id::next_id(),
        alert_id: "42".into(),
        recipient: "ops@example.com".into(),
        channel: "webhook".into(),
        status: "failed".into(),
        error: Some("HTTP 500".into()),
        sent_at: Utc::now(),
    };
    store.insert_notification_log(&row).await.unwrap();
    let logs = store.list_notification_logs("42").await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "failed");
    assert_eq!(logs[0].error.as_deref(), Some("HTTP 500"));
}

#[test]
fn redacts_password_in_db_url() {
    assert_eq!(
        redact_url("postgres://vm:secret@db:5432/vmdash"),
        "postgres://vm:***@db:5432/vmdash"
    );
    assert_eq!(
        redact_url("sqlite://data/vmdash.db?mode=rwc"),
        "sqlite://data/vmdash.db?mode=rwc"
    );
}
