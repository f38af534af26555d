pub mod alerts;
pub mod feed;
pub mod pagination;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use vmdash_alert::error::AlertError;

/// API 错误响应
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// 错误码
    pub err_code: i32,
    /// 错误信息
    pub err_msg: String,
    /// 链路追踪 ID（默认空字符串）
    pub trace_id: String,
}

/// API 统一响应包裹
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 错误码（成功时为 0）
    pub err_code: i32,
    /// 错误信息（成功时为 success）
    pub err_msg: String,
    /// 链路追踪 ID（默认空字符串）
    pub trace_id: String,
    /// 业务数据（有数据时返回）
    pub data: Option<T>,
}

/// 分页数据结构
#[derive(Serialize, ToSchema)]
pub struct PaginatedData<T>
where
    T: Serialize,
{
    /// 数据项列表
    pub items: Vec<T>,
    /// 总数
    pub total: u64,
    /// 每页数量
    pub limit: u64,
    /// 偏移量
    pub offset: u64,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_paginated_response<T>(
    status: StatusCode,
    trace_id: &str,
    items: Vec<T>,
    total: u64,
    limit: u64,
    offset: u64,
) -> Response
where
    T: Serialize,
{
    success_response(
        status,
        trace_id,
        PaginatedData {
            items,
            total,
            limit,
            offset,
        },
    )
}

pub(crate) fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "unauthorized" => 1002,
        "token_expired" => 1003,
        "not_found" => 1004,
        "invalid_transition" => 1005,
        "internal_error" => 1500,
        "storage_error" => 1501,
        "transient_io" => 1503,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// 把生命周期错误映射为 HTTP 响应。
pub fn alert_error_response(trace_id: &str, err: &AlertError) -> Response {
    match err {
        AlertError::NotFound(_) => {
            error_response(StatusCode::NOT_FOUND, trace_id, "not_found", &err.to_string())
        }
        AlertError::InvalidTransition { .. } => error_response(
            StatusCode::CONFLICT,
            trace_id,
            "invalid_transition",
            &err.to_string(),
        ),
        AlertError::Auth(_) => error_response(
            StatusCode::UNAUTHORIZED,
            trace_id,
            "unauthorized",
            &err.to_string(),
        ),
        AlertError::TransientIo(_) => {
            tracing::error!(trace_id = %trace_id, error = %err, "Alert store unavailable");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                trace_id,
                "transient_io",
                "Alert store temporarily unavailable",
            )
        }
    }
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// 服务版本号
    version: String,
    /// 运行时长（秒）
    uptime_secs: i64,
    /// 当前实时推送订阅数
    feed_subscribers: usize,
    /// 告警引擎是否在运行
    engine_running: bool,
}

/// 获取服务健康状态（无需鉴权）。
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "服务健康状态", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            feed_subscribers: state.hub.subscriber_count(),
            engine_running: state.scheduler.is_running(),
        },
    )
}

pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(health))
}

pub fn protected_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(alerts::alert_routes())
        .merge(feed::feed_routes())
}
