use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use domain::auth::entity::JwtClaims;
use domain::common::entity::RuleId;
use domain::ratelimit::entity::{RateLimitAlgorithm, RateLimitRule, RateLimitScope};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{ApiError, ErrorBody};
use super::middleware::rbac::require_write_access;
use super::state::AppState;
use super::validation::{MAX_ID_LENGTH, MAX_SHORT_STRING_LENGTH, validate_string_length};

// ── Request / Response DTOs ─────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct CreateRateLimitRuleRequest {
    pub id: String,
    pub limit: u64,
    pub window_secs: u64,
    #[serde(default)]
    pub burst_capacity: Option<u64>,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_scope() -> String {
    "user".to_string()
}
fn default_algorithm() -> String {
    "token_bucket".to_string()
}
fn default_enabled() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
pub struct CheckRequest {
    pub rule_id: String,
    /// Caller identity the rule's scope keys on (user id, client IP, or
    /// endpoint name; ignored for global rules).
    pub identity: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckResponse {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

#[derive(Serialize, ToSchema)]
pub struct RateLimitRuleResponse {
    pub id: String,
    pub scope: String,
    pub algorithm: String,
    pub limit: u64,
    pub window_secs: u64,
    pub burst_capacity: u64,
    pub enabled: bool,
}

impl RateLimitRuleResponse {
    fn from_rule(rule: &RateLimitRule) -> Self {
        Self {
            id: rule.id.0.clone(),
            scope: rule.scope.as_str().to_string(),
            algorithm: rule.algorithm.as_str().to_string(),
            limit: rule.limit,
            window_secs: rule.window_secs,
            burst_capacity: rule.burst_capacity,
            enabled: rule.enabled,
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// `POST /api/v1/ratelimit/check` — admission decision for a gateway.
///
/// Always returns 200: a denial is data (`allowed=false` with
/// `retry_after_secs`), not an HTTP error. The `Retry-After` header is
/// set on denials for convenience.
#[utoipa::path(
    post, path = "/api/v1/ratelimit/check",
    tag = "Rate Limiting",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Admission decision", body = CheckResponse),
        (status = 404, description = "Unknown rule", body = ErrorBody),
    )
)]
pub async fn check_ratelimit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_string_length("rule_id", &req.rule_id, MAX_ID_LENGTH)?;
    validate_string_length("identity", &req.identity, MAX_SHORT_STRING_LENGTH)?;

    let svc = state.ratelimit_service.read().await;
    let decision = svc.check(&RuleId(req.rule_id), &req.identity)?;
    drop(svc);

    let mut headers = axum::http::HeaderMap::new();
    if !decision.allowed {
        if let Ok(value) = decision.retry_after_secs.to_string().parse() {
            headers.insert(axum::http::header::RETRY_AFTER, value);
        }
    }

    Ok((
        headers,
        Json(CheckResponse {
            allowed: decision.allowed,
            retry_after_secs: decision.retry_after_secs,
        }),
    ))
}

/// `GET /api/v1/ratelimit/rules` — list all rate limit rules.
#[utoipa::path(
    get, path = "/api/v1/ratelimit/rules",
    tag = "Rate Limiting",
    responses((status = 200, description = "List of rate limit rules", body = Vec<RateLimitRuleResponse>))
)]
pub async fn list_ratelimit_rules(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<RateLimitRuleResponse>> {
    let svc = state.ratelimit_service.read().await;
    let rules: Vec<RateLimitRuleResponse> = svc
        .rules()
        .iter()
        .map(RateLimitRuleResponse::from_rule)
        .collect();
    Json(rules)
}

/// `POST /api/v1/ratelimit/rules` — create a new rate limit rule.
#[utoipa::path(
    post, path = "/api/v1/ratelimit/rules",
    tag = "Rate Limiting",
    request_body = CreateRateLimitRuleRequest,
    responses(
        (status = 201, description = "Rule created", body = RateLimitRuleResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 409, description = "Duplicate rule", body = ErrorBody),
    )
)]
pub async fn create_ratelimit_rule(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Json(req): Json<CreateRateLimitRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_write_access(claims)?;
    }
    let rule = parse_request(req)?;
    let rule_id = rule.id.0.clone();

    let mut svc = state.ratelimit_service.write().await;
    svc.add_rule(rule.clone())?;
    drop(svc);

    tracing::info!(rule_id = %rule_id, "ratelimit rule created via API");

    Ok((
        StatusCode::CREATED,
        Json(RateLimitRuleResponse::from_rule(&rule)),
    ))
}

/// `DELETE /api/v1/ratelimit/rules/{id}` — delete a rate limit rule.
#[utoipa::path(
    delete, path = "/api/v1/ratelimit/rules/{id}",
    tag = "Rate Limiting",
    params(("id" = String, Path, description = "Rule identifier")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found", body = ErrorBody),
    )
)]
pub async fn delete_ratelimit_rule(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_write_access(claims)?;
    }
    validate_string_length("id", &id, MAX_ID_LENGTH)?;

    let mut svc = state.ratelimit_service.write().await;
    svc.remove_rule(&RuleId(id.clone()))?;
    drop(svc);

    tracing::info!(rule_id = %id, "ratelimit rule deleted via API");

    Ok(StatusCode::NO_CONTENT)
}

// ── Request parsing ─────────────────────────────────────────────────

fn parse_request(req: CreateRateLimitRuleRequest) -> Result<RateLimitRule, ApiError> {
    validate_string_length("id", &req.id, MAX_ID_LENGTH)?;
    validate_string_length("scope", &req.scope, MAX_SHORT_STRING_LENGTH)?;
    validate_string_length("algorithm", &req.algorithm, MAX_SHORT_STRING_LENGTH)?;

    let scope = RateLimitScope::parse_name(&req.scope).ok_or_else(|| ApiError::BadRequest {
        code: "VALIDATION_ERROR",
        message: format!(
            "invalid scope '{}': expected global, user, ip, or endpoint",
            req.scope
        ),
    })?;

    let algorithm =
        RateLimitAlgorithm::parse_name(&req.algorithm).ok_or_else(|| ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: format!(
                "invalid algorithm '{}': expected token_bucket, fixed_window, sliding_window, or leaky_bucket",
                req.algorithm
            ),
        })?;

    Ok(RateLimitRule {
        id: RuleId(req.id),
        scope,
        algorithm,
        limit: req.limit,
        window_secs: req.window_secs,
        burst_capacity: req.burst_capacity.unwrap_or(req.limit),
        enabled: req.enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::state::test_support::make_test_state;

    fn make_request(id: &str, algorithm: &str) -> CreateRateLimitRuleRequest {
        CreateRateLimitRuleRequest {
            id: id.to_string(),
            limit: 100,
            window_secs: 60,
            burst_capacity: Some(100),
            scope: "user".to_string(),
            algorithm: algorithm.to_string(),
            enabled: true,
        }
    }

    #[test]
    fn parse_request_valid() {
        let rule = parse_request(make_request("rl-001", "token_bucket")).unwrap();
        assert_eq!(rule.id.0, "rl-001");
        assert_eq!(rule.scope, RateLimitScope::User);
        assert_eq!(rule.algorithm, RateLimitAlgorithm::TokenBucket);
        assert_eq!(rule.burst_capacity, 100);
    }

    #[test]
    fn parse_request_invalid_scope() {
        let mut req = make_request("rl-001", "token_bucket");
        req.scope = "tenant".to_string();
        assert!(parse_request(req).is_err());
    }

    #[test]
    fn parse_request_invalid_algorithm() {
        assert!(parse_request(make_request("rl-001", "random")).is_err());
    }

    #[test]
    fn parse_request_defaults_burst_to_limit() {
        let mut req = make_request("rl-001", "token_bucket");
        req.burst_capacity = None;
        assert_eq!(parse_request(req).unwrap().burst_capacity, 100);
    }

    #[tokio::test]
    async fn create_list_delete_round_trip() {
        let state = make_test_state();

        create_ratelimit_rule(
            State(Arc::clone(&state)),
            None,
            Json(make_request("rl-001", "fixed_window")),
        )
        .await
        .unwrap();

        let list = list_ratelimit_rules(State(Arc::clone(&state))).await;
        assert_eq!(list.0.len(), 1);
        assert_eq!(list.0[0].algorithm, "fixed_window");

        delete_ratelimit_rule(State(Arc::clone(&state)), None, Path("rl-001".to_string()))
            .await
            .unwrap();
        let list = list_ratelimit_rules(State(state)).await;
        assert!(list.0.is_empty());
    }

    #[tokio::test]
    async fn duplicate_rule_conflicts() {
        let state = make_test_state();
        create_ratelimit_rule(
            State(Arc::clone(&state)),
            None,
            Json(make_request("rl-001", "token_bucket")),
        )
        .await
        .unwrap();

        let err = create_ratelimit_rule(
            State(state),
            None,
            Json(make_request("rl-001", "token_bucket")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[tokio::test]
    async fn check_allows_then_denies() {
        let state = make_test_state();
        let mut req = make_request("rl-001", "fixed_window");
        req.limit = 2;
        create_ratelimit_rule(State(Arc::clone(&state)), None, Json(req))
            .await
            .unwrap();

        for _ in 0..2 {
            let resp = check_ratelimit(
                State(Arc::clone(&state)),
                Json(CheckRequest {
                    rule_id: "rl-001".to_string(),
                    identity: "alice".to_string(),
                }),
            )
            .await
            .unwrap()
            .into_response();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        // Third request within the window is denied but still HTTP 200.
        let resp = check_ratelimit(
            State(state),
            Json(CheckRequest {
                rule_id: "rl-001".to_string(),
                identity: "alice".to_string(),
            }),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(axum::http::header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn check_unknown_rule_not_found() {
        let state = make_test_state();
        let err = check_ratelimit(
            State(state),
            Json(CheckRequest {
                rule_id: "nope".to_string(),
                identity: "alice".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }
}
