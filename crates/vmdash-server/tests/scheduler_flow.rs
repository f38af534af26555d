mod common;

use common::{build_test_context, make_rule};
use vmdash_alert::MetricReading;
use vmdash_common::types::AlertStatus;
use vmdash_storage::AlertFilter;

#[tokio::test]
async fn breach_inserts_then_recovery_auto_resolves() {
    let ctx = build_test_context().await.expect("context");
    let rule = make_rule("cpu-high", 90.0);
    let mut feed = ctx.state.hub.subscribe();

    ctx.source.set(vec![
        MetricReading::new("node-a", 95.2),
        MetricReading::new("node-b", 40.0),
    ]);
    let report = ctx
        .state
        .scheduler
        .evaluate_now(&rule)
        .await
        .expect("evaluation should succeed");
    assert_eq!(report.inserted.len(), 1);
    let alert = &report.inserted[0];
    assert_eq!(alert.resource_name, "node-a");
    assert_eq!(alert.status, AlertStatus::Active);
    assert_eq!(alert.alert_rule_id.as_deref(), Some("cpu-high"));
    assert_eq!(alert.title, "HIGH: Cpu Usage alert on node-a");

    let change = feed.try_recv().expect("insert should be published");
    assert!(change.is_insert());

    ctx.source.set(vec![MetricReading::new("node-a", 50.0)]);
    let report = ctx
        .state
        .scheduler
        .evaluate_now(&rule)
        .await
        .expect("evaluation should succeed");
    assert_eq!(report.auto_resolved.len(), 1);
    assert_eq!(report.auto_resolved[0].status, AlertStatus::AutoResolved);

    let stored = ctx
        .state
        .store
        .get_alert(&alert.id)
        .await
        .expect("get")
        .expect("alert exists");
    assert_eq!(stored.status, AlertStatus::AutoResolved);
    assert!(stored.resolved_at.is_some());
}

#[tokio::test]
async fn repeated_breach_within_cooldown_raises_once() {
    let ctx = build_test_context().await.expect("context");
    let rule = make_rule("cpu-high", 90.0);
    ctx.source.set(vec![MetricReading::new("node-a", 97.0)]);

    for _ in 0..3 {
        ctx.state
            .scheduler
            .evaluate_now(&rule)
            .await
            .expect("evaluation should succeed");
    }

    let total = ctx
        .state
        .store
        .count_alerts(&AlertFilter::default())
        .await
        .expect("count");
    assert_eq!(total, 1);
    assert_eq!(ctx.state.scheduler.status().cooldowns_active, 1);
}

#[tokio::test]
async fn breach_after_cooldown_refreshes_open_alert() {
    let ctx = build_test_context().await.expect("context");
    let mut rule = make_rule("cpu-high", 90.0);
    rule.cooldown_seconds = 0;

    ctx.source.set(vec![MetricReading::new("node-a", 92.0)]);
    let first = ctx.state.scheduler.evaluate_now(&rule).await.expect("eval");
    assert_eq!(first.inserted.len(), 1);

    ctx.source.set(vec![MetricReading::new("node-a", 99.5)]);
    let second = ctx.state.scheduler.evaluate_now(&rule).await.expect("eval");
    assert!(second.inserted.is_empty());
    assert_eq!(second.refreshed.len(), 1);
    assert_eq!(second.refreshed[0].id, first.inserted[0].id);
    assert!((second.refreshed[0].current_value - 99.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn reload_schedules_enabled_rules_only() {
    let ctx = build_test_context().await.expect("context");
    let store = &ctx.state.store;
    store.insert_alert_rule(&make_rule("a", 90.0)).await.expect("rule");
    store.insert_alert_rule(&make_rule("b", 80.0)).await.expect("rule");
    let mut disabled = make_rule("c", 70.0);
    disabled.enabled = false;
    store.insert_alert_rule(&disabled).await.expect("rule");

    let scheduled = ctx.state.scheduler.reload().await.expect("reload");
    assert_eq!(scheduled, 2);

    let status = ctx.state.scheduler.status();
    assert_eq!(status.jobs, 2);
    assert_eq!(status.next_run_times.len(), 2);
    assert!(!status.running);

    ctx.state.scheduler.stop();
    assert_eq!(ctx.state.scheduler.status().jobs, 0);
}

#[tokio::test]
async fn reload_keeps_unchanged_jobs_and_their_next_run() {
    let ctx = build_test_context().await.expect("context");
    let store = &ctx.state.store;
    // Checked less often than the rule table is reloaded.
    let mut slow = make_rule("slow", 90.0);
    slow.check_interval_seconds = ctx.state.config.engine.reload_interval_secs * 4;
    store.insert_alert_rule(&slow).await.expect("rule");
    store.insert_alert_rule(&make_rule("fast", 80.0)).await.expect("rule");

    assert_eq!(ctx.state.scheduler.reload().await.expect("reload"), 2);
    let before = next_run_of(&ctx, "rule slow");

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(ctx.state.scheduler.reload().await.expect("reload"), 2);
    assert_eq!(next_run_of(&ctx, "rule slow"), before);

    ctx.state.scheduler.stop();
}

#[tokio::test]
async fn reload_reschedules_changed_and_drops_disabled_rules() {
    let ctx = build_test_context().await.expect("context");
    let store = &ctx.state.store;
    store.insert_alert_rule(&make_rule("a", 90.0)).await.expect("rule");
    store.insert_alert_rule(&make_rule("b", 80.0)).await.expect("rule");
    ctx.state.scheduler.reload().await.expect("reload");
    let before = next_run_of(&ctx, "rule a");

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    store.upsert_alert_rule(&make_rule("a", 95.0)).await.expect("upsert");
    store.set_alert_rule_enabled("b", false).await.expect("disable");

    assert_eq!(ctx.state.scheduler.reload().await.expect("reload"), 1);
    assert!(next_run_of(&ctx, "rule a") > before);
    let status = ctx.state.scheduler.status();
    assert_eq!(status.jobs, 1);
    assert!(status.next_run_times.iter().all(|j| j.name != "rule b"));

    ctx.state.scheduler.stop();
}

#[tokio::test]
async fn oversized_check_interval_is_clamped() {
    let ctx = build_test_context().await.expect("context");
    let mut rule = make_rule("huge", 90.0);
    rule.check_interval_seconds = u64::MAX;
    rule.cooldown_seconds = u64::MAX;
    ctx.state.store.insert_alert_rule(&rule).await.expect("rule");

    assert_eq!(ctx.state.scheduler.reload().await.expect("reload"), 1);
    let next = next_run_of(&ctx, "rule huge");
    assert!(next <= chrono::Utc::now() + chrono::Duration::days(8));

    ctx.source.set(vec![MetricReading::new("node-a", 97.0)]);
    let stored = ctx
        .state
        .store
        .get_alert_rule("huge")
        .await
        .expect("get")
        .expect("rule exists");
    let report = ctx.state.scheduler.evaluate_now(&stored).await.expect("eval");
    assert_eq!(report.inserted.len(), 1);
    assert_eq!(ctx.state.scheduler.status().cooldowns_active, 1);

    ctx.state.scheduler.stop();
}

fn next_run_of(ctx: &common::TestContext, name: &str) -> chrono::DateTime<chrono::Utc> {
    ctx.state
        .scheduler
        .status()
        .next_run_times
        .into_iter()
        .find(|j| j.name == name)
        .map(|j| j.next_run)
        .expect("rule should be scheduled")
}
