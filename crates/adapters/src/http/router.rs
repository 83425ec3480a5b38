use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Maximum request body size for API endpoints (128 KiB — config values
/// may reach 64 KiB).
const MAX_BODY_SIZE: usize = 128 * 1024;

/// Rate limit for write endpoints: 60 requests per 60 seconds per IP.
const WRITE_RATE_LIMIT_PER_SECOND: u64 = 1;
const WRITE_RATE_LIMIT_BURST: u32 = 60;

use super::agent_handler::agent_status;
use super::audit_handler::{list_changes, list_secret_access};
use super::config_handler::{
    delete_config_entry, get_config_entry, get_config_history, put_config_entry,
};
use super::health_handler::{healthz, readyz};
use super::metrics_handler::metrics;
use super::middleware::auth::jwt_auth_middleware;
use super::openapi::ApiDoc;
use super::policy_handler::{evaluate_policy, get_policy, list_policies, put_policy};
use super::ratelimit_handler::{
    check_ratelimit, create_ratelimit_rule, delete_ratelimit_rule, list_ratelimit_rules,
};
use super::rotation_handler::{
    create_rotation_policy, delete_rotation_policy, get_rotation_policy, list_rotation_policies,
};
use super::secrets_handler::{
    create_secret, list_secrets, read_secret, revoke_secret, rotate_secret, secret_metadata,
};
use super::state::AppState;
use super::subscribe_handler::subscribe;

/// Build the main Axum router with all REST API routes.
///
/// Routes are split into three groups:
/// 1. **Public** (no auth): `/healthz`, `/readyz` — K8s probes
/// 2. **Metrics** (conditional auth): `/metrics` — auth only when configured
/// 3. **API** (protected): `/api/v1/*` — auth when provider is present
pub fn build_router(state: Arc<AppState>, swagger_ui: bool) -> Router {
    // Group 1: Public routes — never require auth (K8s probes)
    let public_routes = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz));

    // Group 2: Metrics route — conditionally protected
    let metrics_routes = {
        let r = Router::new().route("/metrics", get(metrics));
        if state.auth_provider.is_some() && state.metrics_auth_required {
            r.layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                jwt_auth_middleware,
            ))
        } else {
            r
        }
    };

    // Group 3: Protected API routes — split into read and write
    //
    // Write routes get an additional per-IP rate limit (60 req/min).
    // Read routes — including the gateway check endpoint, which sits on
    // hot request paths — have no governor.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(WRITE_RATE_LIMIT_PER_SECOND)
            .burst_size(WRITE_RATE_LIMIT_BURST)
            .finish()
            .expect("governor config should build"),
    );

    let api_routes = {
        let read_routes = Router::new()
            .route("/api/v1/agent/status", get(agent_status))
            .route("/api/v1/config/{key}", get(get_config_entry))
            .route("/api/v1/config/{key}/history", get(get_config_history))
            .route("/api/v1/secrets", get(list_secrets))
            .route("/api/v1/secrets/{name}", get(read_secret))
            .route("/api/v1/secrets/{name}/metadata", get(secret_metadata))
            .route("/api/v1/rotation/policies", get(list_rotation_policies))
            .route("/api/v1/rotation/policies/{name}", get(get_rotation_policy))
            .route("/api/v1/ratelimit/rules", get(list_ratelimit_rules))
            .route("/api/v1/ratelimit/check", post(check_ratelimit))
            .route("/api/v1/policies", get(list_policies))
            .route("/api/v1/policies/{id}", get(get_policy))
            .route("/api/v1/policies/{id}/evaluate", post(evaluate_policy))
            .route("/api/v1/subscribe", get(subscribe))
            .route("/api/v1/audit/changes", get(list_changes))
            .route("/api/v1/audit/secret-access", get(list_secret_access));

        // Write routes (rate limited: 60 req/min per IP)
        let write_routes = Router::new()
            .route("/api/v1/config/{key}", put(put_config_entry))
            .route("/api/v1/config/{key}", delete(delete_config_entry))
            .route("/api/v1/secrets", post(create_secret))
            .route("/api/v1/secrets/{name}/rotate", post(rotate_secret))
            .route("/api/v1/secrets/{name}/revoke", post(revoke_secret))
            .route("/api/v1/rotation/policies", post(create_rotation_policy))
            .route(
                "/api/v1/rotation/policies/{name}",
                delete(delete_rotation_policy),
            )
            .route("/api/v1/ratelimit/rules", post(create_ratelimit_rule))
            .route(
                "/api/v1/ratelimit/rules/{id}",
                delete(delete_ratelimit_rule),
            )
            .route("/api/v1/policies/{id}", put(put_policy))
            .layer(GovernorLayer::new(governor_conf));

        let r = read_routes
            .merge(write_routes)
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

        if state.auth_provider.is_some() {
            r.layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                jwt_auth_middleware,
            ))
        } else {
            r
        }
    };

    let mut router = public_routes.merge(metrics_routes).merge(api_routes);

    if swagger_ui {
        router = router
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::state::test_support::make_test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_route_works() {
        let router = build_router(make_test_state(), false);
        let resp = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_route_works() {
        let router = build_router(make_test_state(), false);
        let resp = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let router = build_router(make_test_state(), false);
        let resp = router
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn config_get_missing_is_404() {
        let router = build_router(make_test_state(), false);
        let resp = router
            .oneshot(
                Request::get("/api/v1/config/db.timeout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn swagger_ui_served_when_enabled() {
        let router = build_router(make_test_state(), true);
        let resp = router
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
