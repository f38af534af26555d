use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, State};
use axum::response::IntoResponse;
use tokio::sync::broadcast::{self, error::RecvError};
use utoipa_axum::{router::OpenApiRouter, routes};
use vmdash_alert::session::Session;
use vmdash_common::types::AlertChange;

/// 告警实时推送（WebSocket）。
///
/// 每个变更以一帧 JSON 文本发送：`{"type":"INSERT"|"UPDATE","record":{...}}`。
/// 浏览器无法设置请求头，可通过 `?access_token=` 传递 token。
/// 订阅者处理过慢时服务端以 1013 关闭连接，客户端应重连并全量刷新。
#[utoipa::path(
    get,
    path = "/v1/alerts/feed",
    tag = "Feed",
    security(("bearer_auth" = [])),
    params(("access_token" = Option<String>, Query, description = "Bearer token（无法设置请求头时使用）")),
    responses(
        (status = 101, description = "切换到 WebSocket 协议", body = AlertChange),
        (status = 401, description = "未认证", body = crate::api::ApiError)
    )
)]
async fn alert_feed(
    Extension(trace_id): Extension<TraceId>,
    Extension(session): Extension<Session>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // 升级前订阅，握手期间产生的变更不会丢失
    let rx = state.hub.subscribe();
    let trace_id = trace_id.0;
    ws.on_upgrade(move |socket| forward_changes(socket, rx, session, trace_id))
}

async fn forward_changes(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<AlertChange>,
    session: Session,
    trace_id: String,
) {
    tracing::info!(trace_id = %trace_id, user_id = %session.user_id, "Feed subscriber connected");

    loop {
        tokio::select! {
            change = rx.recv() => match change {
                Ok(change) => {
                    let text = match serde_json::to_string(&change) {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::error!(trace_id = %trace_id, error = %e, "Failed to encode alert change");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(trace_id = %trace_id, skipped, "Feed subscriber lagged, closing");
                    let _ = socket
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AGAIN,
                            reason: "lagged".into(),
                        })))
                        .await;
                    break;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(trace_id = %trace_id, error = %e, "Feed socket error");
                    break;
                }
            },
        }
    }

    tracing::info!(trace_id = %trace_id, user_id = %session.user_id, "Feed subscriber disconnected");
}

pub fn feed_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(alert_feed))
}
