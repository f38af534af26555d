use crate::state::AppState;
use crate::{api, auth, logging, openapi};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "vmdash API",
        description = "vmdash 告警生命周期管理 REST API",
    ),
    tags(
        (name = "Health", description = "服务健康检查"),
        (name = "Alerts", description = "告警查询、确认与解决"),
        (name = "Feed", description = "告警实时推送")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(values))
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (protected_router, protected_spec) = api::protected_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(protected_spec);
    let spec = Arc::new(merged_spec);

    let cors = cors_layer(&state.config.cors_allowed_origins);

    public_router
        .merge(protected_router.layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth_middleware,
        )))
        .with_state(state)
        .merge(openapi::json_route(spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
