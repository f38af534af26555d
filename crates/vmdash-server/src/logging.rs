use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;

/// 实时推送的 WebSocket 升级路径，不记录也不缓冲响应体
pub const FEED_PATH: &str = "/v1/alerts/feed";

/// 请求扩展中的链路追踪 ID。
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// 生成 16 位十六进制 trace id（8 个随机字节）。
pub(crate) fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(16);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

const MAX_BODY_LOG_CHARS: usize = 200;

/// 截断到至多 `max` 字节，落在字符边界上。
pub(crate) fn truncate_body(bytes: &[u8], max: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.len() > max => {
            let mut end = max;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => "<non-utf8 body>".to_string(),
    }
}

pub(crate) fn format_elapsed(elapsed_us: u128) -> String {
    if elapsed_us < 1000 {
        format!("{elapsed_us}µs")
    } else if elapsed_us < 1_000_000 {
        format!("{}ms", elapsed_us / 1000)
    } else {
        format!("{:.1}s", elapsed_us as f64 / 1_000_000.0)
    }
}

/// 请求/响应日志中间件，并在响应头写入 `X-Trace-Id`。
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path().to_string();

    // WebSocket 升级：不缓冲响应，query 中的 access_token 也不能落日志
    if path == FEED_PATH {
        tracing::info!(trace_id = %trace_id, method = %method, path = %path, "--> feed upgrade");
        let mut response = next.run(req).await;
        if let Ok(val) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("X-Trace-Id", val);
        }
        return response;
    }

    let query = uri.query().unwrap_or("");
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let has_body = matches!(method.as_str(), "POST" | "PUT" | "PATCH");
    let (req, req_body_snippet) = if has_body {
        let (parts, body) = req.into_parts();
        let body_bytes = axum::body::to_bytes(body, 1024 * 1024)
            .await
            .unwrap_or_default();
        let snippet = if body_bytes.is_empty() {
            String::new()
        } else {
            truncate_body(&body_bytes, MAX_BODY_LOG_CHARS)
        };
        (Request::from_parts(parts, Body::from(body_bytes)), snippet)
    } else {
        (req, String::new())
    };

    let url = if query.is_empty() {
        path.clone()
    } else {
        format!("{path}?{query}")
    };

    if req_body_snippet.is_empty() {
        tracing::info!(
            trace_id = %trace_id,
            method = %method,
            path = %url,
            ua = %user_agent,
            "--> request"
        );
    } else {
        tracing::info!(
            trace_id = %trace_id,
            method = %method,
            path = %url,
            body = %req_body_snippet,
            ua = %user_agent,
            "--> request"
        );
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = format_elapsed(start.elapsed().as_micros());
    let status = response.status();

    let (parts, body) = response.into_parts();
    let is_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    // OpenAPI 文档体积大，不打印
    let body_snippet = if is_json && !body_bytes.is_empty() && path != "/v1/openapi.json" {
        truncate_body(&body_bytes, MAX_BODY_LOG_CHARS)
    } else {
        String::new()
    };

    let status_code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(
            trace_id = %trace_id,
            status = status_code,
            elapsed = %elapsed,
            body = %body_snippet,
            "<-- response"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            trace_id = %trace_id,
            status = status_code,
            elapsed = %elapsed,
            body = %body_snippet,
            "<-- response"
        );
    } else if body_snippet.is_empty() {
        tracing::info!(
            trace_id = %trace_id,
            status = status_code,
            elapsed = %elapsed,
            "<-- response"
        );
    } else {
        tracing::info!(
            trace_id = %trace_id,
            status = status_code,
            elapsed = %elapsed,
            body = %body_snippet,
            "<-- response"
        );
    }

    let mut response = Response::from_parts(parts, Body::from(body_bytes));
    if let Ok(val) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("X-Trace-Id", val);
    }
    response
}
