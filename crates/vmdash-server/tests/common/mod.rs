#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::util::ServiceExt;
use vmdash_alert::evaluator::Evaluator;
use vmdash_alert::{MetricReading, MetricSource};
use vmdash_common::types::{
    Alert, AlertCategory, AlertRuleDef, AlertStatus, Severity,
};
use vmdash_feed::FeedHub;
use vmdash_server::app;
use vmdash_server::auth::create_token;
use vmdash_server::config::ServerConfig;
use vmdash_server::engine::{self, scheduler::RuleScheduler};
use vmdash_server::state::AppState;
use vmdash_storage::AlertStore;

pub const TEST_SECRET: &str = "test-secret";

/// Metric source whose readings the test sets directly.
#[derive(Default)]
pub struct StubSource {
    readings: Mutex<Vec<MetricReading>>,
}

impl StubSource {
    pub fn set(&self, readings: Vec<MetricReading>) {
        *self.readings.lock().expect("stub lock") = readings;
    }
}

#[async_trait]
impl MetricSource for StubSource {
    async fn sample(&self, _rule: &AlertRuleDef) -> anyhow::Result<Vec<MetricReading>> {
        Ok(self.readings.lock().expect("stub lock").clone())
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
    pub source: Arc<StubSource>,
}

pub async fn build_test_context() -> Result<TestContext> {
    vmdash_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let db_url = format!(
        "sqlite://{}?mode=rwc",
        temp_dir.path().join("vmdash.db").to_string_lossy()
    );
    let store = Arc::new(AlertStore::new(&db_url).await?);

    let mut config = ServerConfig::default();
    config.database.url = db_url;
    config.auth.jwt_secret = Some(TEST_SECRET.to_string());

    let hub = FeedHub::new(config.feed.channel_capacity);
    let manager = Arc::new(engine::build_manager(
        &config.engine,
        store.clone(),
        Arc::new(hub.clone()),
    )?);
    let source = Arc::new(StubSource::default());
    let evaluator = Arc::new(Evaluator::new(source.clone(), manager.clone()));
    let scheduler = Arc::new(RuleScheduler::new(
        store.clone(),
        evaluator,
        None,
        config.engine.reload_interval_secs,
    ));

    let state = AppState {
        store,
        manager,
        hub,
        scheduler,
        start_time: Utc::now(),
        jwt_secret: Arc::new(TEST_SECRET.to_string()),
        config: Arc::new(config),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
        source,
    })
}

pub fn make_token() -> String {
    create_token(
        TEST_SECRET,
        "user-1",
        Some("ops@example.com"),
        Some("authenticated"),
        3600,
    )
    .expect("token should sign")
}

pub fn make_alert(id: &str, resource: &str, severity: Severity, mins_ago: i64) -> Alert {
    let triggered_at = Utc::now() - Duration::minutes(mins_ago);
    Alert {
        id: id.to_string(),
        severity,
        status: AlertStatus::Active,
        category: AlertCategory::NodeHealth,
        resource_name: resource.to_string(),
        metric_name: "cpu_usage".to_string(),
        current_value: 95.2,
        threshold_value: 90.0,
        title: format!("{}: CPU Usage alert on {resource}", severity.as_str().to_uppercase()),
        message: "CPU Usage is 95.2%".to_string(),
        triggered_at,
        alert_rule_id: None,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        updated_at: Some(triggered_at),
    }
}

pub fn make_rule(id: &str, threshold: f64) -> AlertRuleDef {
    AlertRuleDef {
        id: id.to_string(),
        name: format!("rule {id}"),
        category: AlertCategory::NodeHealth,
        severity: Severity::High,
        metric_type: "cpu_usage".to_string(),
        condition_operator: ">".to_string(),
        threshold_value: threshold,
        check_interval_seconds: 60,
        cooldown_seconds: 300,
        influx_query: None,
        enabled: true,
    }
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty()).expect("request should build");
    send(app, req).await
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(body: &Value) {
    assert_eq!(body["err_code"], 0, "unexpected body: {body}");
    assert_eq!(body["err_msg"], "success");
    assert!(body["trace_id"].is_string());
}

pub fn assert_err_envelope(body: &Value, err_code: i64) {
    assert_eq!(body["err_code"], err_code, "unexpected body: {body}");
    assert!(body["err_msg"].is_string());
    assert!(body["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(body: &Value) -> T {
    serde_json::from_value(body["data"].clone()).expect("data should decode")
}
