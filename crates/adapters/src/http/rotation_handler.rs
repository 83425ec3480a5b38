use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use domain::auth::entity::JwtClaims;
use domain::rotation::entity::RotationPolicy;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{ApiError, ErrorBody};
use super::middleware::rbac::require_admin;
use super::state::AppState;
use super::validation::{MAX_ID_LENGTH, validate_string_length};

// ── Request / Response DTOs ─────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct CreateRotationPolicyRequest {
    pub secret_name: String,
    pub interval_secs: u64,
    #[serde(default)]
    pub grace_period_secs: u64,
}

#[derive(Serialize, ToSchema)]
pub struct RotationPolicyResponse {
    pub secret_name: String,
    pub interval_secs: u64,
    pub grace_period_secs: u64,
    pub last_rotated_at_ms: Option<u64>,
    pub next_rotation_at_ms: u64,
    /// Last observed run state, when the scheduler has processed this
    /// policy.
    pub run_state: Option<String>,
}

impl RotationPolicyResponse {
    fn from_policy(policy: &RotationPolicy, run_state: Option<String>) -> Self {
        Self {
            secret_name: policy.secret_name.clone(),
            interval_secs: policy.interval_secs,
            grace_period_secs: policy.grace_period_secs,
            last_rotated_at_ms: policy.last_rotated_at_ms,
            next_rotation_at_ms: policy.next_rotation_at_ms,
            run_state,
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// `GET /api/v1/rotation/policies` — list rotation policies.
#[utoipa::path(
    get, path = "/api/v1/rotation/policies",
    tag = "Rotation",
    responses((status = 200, description = "All rotation policies", body = Vec<RotationPolicyResponse>))
)]
pub async fn list_rotation_policies(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<RotationPolicyResponse>> {
    let svc = state.rotation_service.read().await;
    Json(
        svc.policies()
            .map(|p| {
                let run = svc.run_state(&p.secret_name).map(|r| r.state.to_string());
                RotationPolicyResponse::from_policy(p, run)
            })
            .collect(),
    )
}

/// `GET /api/v1/rotation/policies/{name}` — one policy with run state.
#[utoipa::path(
    get, path = "/api/v1/rotation/policies/{name}",
    tag = "Rotation",
    params(("name" = String, Path, description = "Secret name")),
    responses(
        (status = 200, description = "Rotation policy", body = RotationPolicyResponse),
        (status = 404, description = "Policy not found", body = ErrorBody),
    )
)]
pub async fn get_rotation_policy(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<RotationPolicyResponse>, ApiError> {
    validate_string_length("secret_name", &name, MAX_ID_LENGTH)?;
    let svc = state.rotation_service.read().await;
    let policy = svc.get(&name)?;
    let run = svc.run_state(&name).map(|r| r.state.to_string());
    Ok(Json(RotationPolicyResponse::from_policy(policy, run)))
}

/// `POST /api/v1/rotation/policies` — register a rotation schedule.
#[utoipa::path(
    post, path = "/api/v1/rotation/policies",
    tag = "Rotation",
    request_body = CreateRotationPolicyRequest,
    responses(
        (status = 201, description = "Policy created", body = RotationPolicyResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 404, description = "Secret does not exist", body = ErrorBody),
        (status = 409, description = "Duplicate policy", body = ErrorBody),
    )
)]
pub async fn create_rotation_policy(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Json(req): Json<CreateRotationPolicyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_admin(claims)?;
    }
    validate_string_length("secret_name", &req.secret_name, MAX_ID_LENGTH)?;

    // A schedule for a nonexistent secret would rotate nothing forever.
    {
        let secrets = state.secrets_service.read().await;
        secrets.get(&domain::secrets::entity::SecretName(req.secret_name.clone()))?;
    }

    let policy = RotationPolicy {
        secret_name: req.secret_name.clone(),
        interval_secs: req.interval_secs,
        grace_period_secs: req.grace_period_secs,
        last_rotated_at_ms: None,
        next_rotation_at_ms: 0,
    };

    let mut svc = state.rotation_service.write().await;
    svc.add_policy(policy)?;
    let stored = svc.get(&req.secret_name)?;
    let response = RotationPolicyResponse::from_policy(stored, None);
    drop(svc);

    tracing::info!(secret = %req.secret_name, interval_secs = req.interval_secs, "rotation policy created via API");

    Ok((StatusCode::CREATED, Json(response)))
}

/// `DELETE /api/v1/rotation/policies/{name}` — remove a schedule.
#[utoipa::path(
    delete, path = "/api/v1/rotation/policies/{name}",
    tag = "Rotation",
    params(("name" = String, Path, description = "Secret name")),
    responses(
        (status = 204, description = "Policy removed"),
        (status = 404, description = "Policy not found", body = ErrorBody),
    )
)]
pub async fn delete_rotation_policy(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    claims: Option<Extension<JwtClaims>>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_admin(claims)?;
    }
    validate_string_length("secret_name", &name, MAX_ID_LENGTH)?;

    let mut svc = state.rotation_service.write().await;
    svc.remove_policy(&name)?;
    drop(svc);

    tracing::info!(secret = %name, "rotation policy removed via API");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::secrets_handler::{CreateSecretRequest, create_secret};
    use crate::http::state::test_support::make_test_state;

    async fn create_secret_fixture(state: &Arc<AppState>, name: &str) {
        create_secret(
            State(Arc::clone(state)),
            None,
            Json(CreateSecretRequest {
                name: name.to_string(),
                value: "v1".to_string(),
            }),
        )
        .await
        .unwrap();
    }

    fn make_request(name: &str) -> CreateRotationPolicyRequest {
        CreateRotationPolicyRequest {
            secret_name: name.to_string(),
            interval_secs: 86_400,
            grace_period_secs: 3_600,
        }
    }

    #[tokio::test]
    async fn create_and_list_policies() {
        let state = make_test_state();
        create_secret_fixture(&state, "api-key").await;

        create_rotation_policy(State(Arc::clone(&state)), None, Json(make_request("api-key")))
            .await
            .unwrap();

        let list = list_rotation_policies(State(state)).await;
        assert_eq!(list.0.len(), 1);
        assert_eq!(list.0[0].secret_name, "api-key");
        // The first rotation is scheduled one interval out.
        assert!(list.0[0].next_rotation_at_ms > 0);
    }

    #[tokio::test]
    async fn policy_for_missing_secret_rejected() {
        let state = make_test_state();
        let err = create_rotation_policy(State(state), None, Json(make_request("ghost")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_policy_conflicts() {
        let state = make_test_state();
        create_secret_fixture(&state, "api-key").await;
        create_rotation_policy(State(Arc::clone(&state)), None, Json(make_request("api-key")))
            .await
            .unwrap();

        let err =
            create_rotation_policy(State(state), None, Json(make_request("api-key")))
                .await
                .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[tokio::test]
    async fn invalid_interval_rejected() {
        let state = make_test_state();
        create_secret_fixture(&state, "api-key").await;
        let mut req = make_request("api-key");
        req.interval_secs = 10;
        let err = create_rotation_policy(State(state), None, Json(req))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn delete_policy() {
        let state = make_test_state();
        create_secret_fixture(&state, "api-key").await;
        create_rotation_policy(State(Arc::clone(&state)), None, Json(make_request("api-key")))
            .await
            .unwrap();

        delete_rotation_policy(State(Arc::clone(&state)), Path("api-key".to_string()), None)
            .await
            .unwrap();

        let err = get_rotation_policy(State(state), Path("api-key".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }
}
