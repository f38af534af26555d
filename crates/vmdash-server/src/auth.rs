use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use vmdash_alert::session::Session;

use crate::api::error_response;
use crate::logging::{TraceId, FEED_PATH};
use crate::state::AppState;

/// 认证平台签发的 access token 声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl Claims {
    pub fn session(&self) -> Session {
        Session::new(self.sub.clone(), self.email.clone())
    }
}

/// 签发 HS256 token。生产环境由认证平台签发，这里供运维脚本与测试使用。
pub fn create_token(
    secret: &str,
    user_id: &str,
    email: Option<&str>,
    audience: Option<&str>,
    expire_secs: i64,
) -> anyhow::Result<String> {
    let exp = chrono::Utc::now().timestamp() + expire_secs;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.map(str::to_string),
        exp: exp.max(0) as u64,
        aud: audience.map(str::to_string),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn validate_token(
    secret: &str,
    audience: Option<&str>,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    match audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// 生成随机密钥（未配置 jwt_secret 时使用）。
pub fn generate_secret() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// WebSocket 客户端无法设置请求头，实时推送路径允许 `?access_token=`。
fn query_token(req: &Request<Body>) -> Option<String> {
    if req.uri().path() != FEED_PATH {
        return None;
    }
    req.uri().query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "access_token" && !value.is_empty()).then(|| value.to_string())
    })
}

/// JWT 鉴权中间件，校验通过后注入 [`Session`] 与 [`Claims`]。
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let header_token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|header| header.strip_prefix("Bearer ").map(str::to_string));

    let token = match (header_token, query_token(&req)) {
        (Some(Some(token)), _) if !token.is_empty() => token,
        (Some(_), _) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                &trace_id,
                "unauthorized",
                "invalid authorization header",
            );
        }
        (None, Some(token)) => token,
        (None, None) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                &trace_id,
                "unauthorized",
                "missing authorization token",
            );
        }
    };

    match validate_token(&state.jwt_secret, state.config.auth.audience.as_deref(), &token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims.session());
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => error_response(
            StatusCode::UNAUTHORIZED,
            &trace_id,
            "token_expired",
            "token expired",
        ),
        Err(e) => {
            tracing::debug!(trace_id = %trace_id, error = %e, "Token validation failed");
            error_response(
                StatusCode::UNAUTHORIZED,
                &trace_id,
                "unauthorized",
                "invalid token",
            )
        }
    }
}
