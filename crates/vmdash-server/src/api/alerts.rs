use crate::api::pagination::PaginationParams;
use crate::api::{alert_error_response, error_response, success_paginated_response, success_response};
use crate::engine::scheduler::EngineStatus;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use vmdash_alert::error::AlertError;
use vmdash_alert::session::Session;
use vmdash_common::types::{
    Alert, AlertCategory, AlertDigest, AlertRuleDef, AlertStats, AlertStatus, Severity,
};
use vmdash_storage::AlertFilter;

fn storage_failure(trace_id: &str, err: vmdash_storage::error::StorageError) -> Response {
    alert_error_response(trace_id, &AlertError::from(err))
}

fn bad_request(trace_id: &str, msg: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", msg)
}

// ---- Alert list ----

/// 告警列表查询参数
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListAlertsParams {
    /// 状态过滤，逗号分隔（active / acknowledged / resolved / auto_resolved），为空或 all 表示全部
    #[param(required = false)]
    status: Option<String>,
    /// 告警级别（low / medium / high）
    #[param(required = false)]
    severity: Option<String>,
    /// 分类（node_health / vm_resource / vm_status / application）
    #[param(required = false)]
    category: Option<String>,
    /// 资源名子串匹配
    #[param(required = false)]
    resource_name: Option<String>,
    /// 触发时间下限（RFC 3339）
    #[param(required = false)]
    start: Option<String>,
    /// 触发时间上限（RFC 3339）
    #[param(required = false)]
    end: Option<String>,
    /// 每页条数（默认 50，最大 200）
    #[param(required = false)]
    #[serde(
        default,
        deserialize_with = "crate::api::pagination::deserialize_optional_u64"
    )]
    limit: Option<u64>,
    /// 偏移量（默认 0）
    #[param(required = false)]
    #[serde(
        default,
        deserialize_with = "crate::api::pagination::deserialize_optional_u64"
    )]
    offset: Option<u64>,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_time(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| format!("invalid {field}: {e}"))
        })
        .transpose()
}

impl ListAlertsParams {
    fn to_filter(&self) -> Result<AlertFilter, String> {
        let statuses = match non_empty(&self.status) {
            None | Some("all") => Vec::new(),
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<AlertStatus>())
                .collect::<Result<Vec<_>, _>>()?,
        };
        let severity = non_empty(&self.severity)
            .map(|s| s.parse::<Severity>())
            .transpose()?;
        let category = non_empty(&self.category)
            .map(|s| s.parse::<AlertCategory>())
            .transpose()?;

        Ok(AlertFilter {
            statuses,
            severity,
            category,
            resource_contains: non_empty(&self.resource_name).map(str::to_string),
            triggered_from: parse_time("start", non_empty(&self.start))?,
            triggered_to: parse_time("end", non_empty(&self.end))?,
        })
    }
}

/// 分页查询告警。
/// 默认排序：`triggered_at` 倒序；默认分页：`limit=50&offset=0`。
#[utoipa::path(
    get,
    path = "/v1/alerts",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(ListAlertsParams),
    responses(
        (status = 200, description = "告警分页列表", body = Vec<Alert>),
        (status = 400, description = "参数错误", body = crate::api::ApiError),
        (status = 401, description = "未认证", body = crate::api::ApiError)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListAlertsParams>,
) -> impl IntoResponse {
    let filter = match params.to_filter() {
        Ok(f) => f,
        Err(msg) => return bad_request(&trace_id, &msg),
    };
    let limit = PaginationParams::resolve_limit(params.limit);
    let offset = PaginationParams::resolve_offset(params.offset);

    let total = match state.store.count_alerts(&filter).await {
        Ok(c) => c,
        Err(e) => return storage_failure(&trace_id, e),
    };
    match state.store.query_alerts(&filter, limit, offset).await {
        Ok(items) => {
            success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
        }
        Err(e) => storage_failure(&trace_id, e),
    }
}

/// 获取单条告警。
#[utoipa::path(
    get,
    path = "/v1/alerts/{id}",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "告警 ID")),
    responses(
        (status = 200, description = "告警详情", body = Alert),
        (status = 401, description = "未认证", body = crate::api::ApiError),
        (status = 404, description = "告警不存在", body = crate::api::ApiError)
    )
)]
async fn get_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.manager.get(&id).await {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

// ---- Alert lifecycle ----

/// 确认告警（仅 active 状态可确认）。
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/acknowledge",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "告警 ID")),
    responses(
        (status = 200, description = "告警已确认", body = Alert),
        (status = 401, description = "未认证", body = crate::api::ApiError),
        (status = 404, description = "告警不存在", body = crate::api::ApiError),
        (status = 409, description = "当前状态不允许确认", body = crate::api::ApiError)
    )
)]
async fn acknowledge_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(session): Extension<Session>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.manager.acknowledge(&session, &id).await {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

/// 解决告警（active 或 acknowledged 状态可解决）。
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/resolve",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "告警 ID")),
    responses(
        (status = 200, description = "告警已解决", body = Alert),
        (status = 401, description = "未认证", body = crate::api::ApiError),
        (status = 404, description = "告警不存在", body = crate::api::ApiError),
        (status = 409, description = "当前状态不允许解决", body = crate::api::ApiError)
    )
)]
async fn resolve_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(session): Extension<Session>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.manager.resolve(&session, &id).await {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

// ---- Aggregates ----

/// 告警统计与引擎状态
#[derive(Serialize, ToSchema)]
struct AlertSummaryResponse {
    #[serde(flatten)]
    stats: AlertStats,
    engine_status: EngineStatus,
}

/// 全量告警统计（不受列表过滤条件影响）。
#[utoipa::path(
    get,
    path = "/v1/alerts/stats/summary",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "告警统计", body = AlertSummaryResponse),
        (status = 401, description = "未认证", body = crate::api::ApiError)
    )
)]
async fn alert_summary(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.alert_stats().await {
        Ok(stats) => success_response(
            StatusCode::OK,
            &trace_id,
            AlertSummaryResponse {
                stats,
                engine_status: state.scheduler.status(),
            },
        ),
        Err(e) => storage_failure(&trace_id, e),
    }
}

/// 全量告警摘要（id / status / severity），供客户端维护统计索引。
#[utoipa::path(
    get,
    path = "/v1/alerts/digests",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "告警摘要列表", body = Vec<AlertDigest>),
        (status = 401, description = "未认证", body = crate::api::ApiError)
    )
)]
async fn alert_digests(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.manager.digests().await {
        Ok(digests) => success_response(StatusCode::OK, &trace_id, digests),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

// ---- Rules & engine ----

/// 告警规则列表
#[derive(Serialize, ToSchema)]
struct AlertRuleListResponse {
    rules: Vec<AlertRuleDef>,
    count: usize,
}

/// 列出全部告警规则，按分类、级别（高到低）排序。
#[utoipa::path(
    get,
    path = "/v1/alerts/rules",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "告警规则列表", body = AlertRuleListResponse),
        (status = 401, description = "未认证", body = crate::api::ApiError)
    )
)]
async fn list_alert_rules(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.list_alert_rules().await {
        Ok(mut rules) => {
            rules.sort_by(|a, b| {
                a.category
                    .as_str()
                    .cmp(b.category.as_str())
                    .then(b.severity.cmp(&a.severity))
            });
            let count = rules.len();
            success_response(StatusCode::OK, &trace_id, AlertRuleListResponse { rules, count })
        }
        Err(e) => storage_failure(&trace_id, e),
    }
}

/// 告警引擎健康状态
#[derive(Serialize, ToSchema)]
struct EngineHealthResponse {
    healthy: bool,
    status: EngineStatus,
    timestamp: DateTime<Utc>,
}

/// 告警引擎健康检查。
#[utoipa::path(
    get,
    path = "/v1/alerts/engine/health",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "引擎健康状态", body = EngineHealthResponse),
        (status = 401, description = "未认证", body = crate::api::ApiError)
    )
)]
async fn engine_health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let status = state.scheduler.status();
    success_response(
        StatusCode::OK,
        &trace_id,
        EngineHealthResponse {
            healthy: status.running,
            status,
            timestamp: Utc::now(),
        },
    )
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alerts))
        .routes(routes!(get_alert))
        .routes(routes!(acknowledge_alert))
        .routes(routes!(resolve_alert))
        .routes(routes!(alert_summary))
        .routes(routes!(alert_digests))
        .routes(routes!(list_alert_rules))
        .routes(routes!(engine_health))
}
