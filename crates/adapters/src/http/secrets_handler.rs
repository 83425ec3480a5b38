use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use domain::audit::entity::{ChangeActor, ChangeOp};
use domain::auth::entity::JwtClaims;
use domain::common::entity::EntityKind;
use domain::secrets::entity::{Secret, SecretName};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{ApiError, ErrorBody};
use super::middleware::rbac::{require_admin, require_secret_read, require_write_access};
use super::state::AppState;
use super::validation::{MAX_ID_LENGTH, MAX_SECRET_LENGTH, validate_string_length};

// ── Request / Response DTOs ─────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct CreateSecretRequest {
    pub name: String,
    pub value: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RotateQuery {
    /// Skip the grace period and revoke the previous version at once.
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ReadSecretQuery {
    /// Pin a specific version (deprecated versions resolve during their
    /// grace window).
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct RevokeSecretRequest {
    pub version: u64,
}

#[derive(Serialize, ToSchema)]
pub struct SecretValueResponse {
    pub name: String,
    pub version: u64,
    pub value: String,
}

#[derive(Serialize, ToSchema)]
pub struct SecretVersionResponse {
    pub version: u64,
    pub status: String,
    pub created_at_ms: u64,
    pub deprecated_expires_at_ms: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct SecretMetadataResponse {
    pub name: String,
    pub versions: Vec<SecretVersionResponse>,
    pub access_count: u64,
    pub created_at_ms: u64,
}

impl SecretMetadataResponse {
    fn from_secret(secret: &Secret) -> Self {
        Self {
            name: secret.name.0.clone(),
            versions: secret
                .versions
                .iter()
                .map(|v| SecretVersionResponse {
                    version: v.version,
                    status: v.status.as_str().to_string(),
                    created_at_ms: v.created_at_ms,
                    deprecated_expires_at_ms: v.deprecated_expires_at_ms,
                })
                .collect(),
            access_count: secret.access_count,
            created_at_ms: secret.created_at_ms,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RotateSecretResponse {
    pub name: String,
    pub new_version: u64,
}

// ── Handlers ────────────────────────────────────────────────────────

/// `POST /api/v1/secrets` — create a secret at version 1.
#[utoipa::path(
    post, path = "/api/v1/secrets",
    tag = "Secrets",
    request_body = CreateSecretRequest,
    responses(
        (status = 201, description = "Secret created", body = SecretMetadataResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 409, description = "Duplicate secret", body = ErrorBody),
    )
)]
pub async fn create_secret(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Json(req): Json<CreateSecretRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_write_access(claims)?;
    }
    validate_string_length("name", &req.name, MAX_ID_LENGTH)?;
    validate_string_length("value", &req.value, MAX_SECRET_LENGTH)?;
    let name = SecretName(req.name);
    let principal = principal_name(&claims);

    let mut svc = state.secrets_service.write().await;
    let version = svc.create(name.clone(), &req.value)?;
    let metadata = SecretMetadataResponse::from_secret(svc.get(&name)?);
    drop(svc);

    tracing::info!(secret = %name, "secret created via API");

    state.audit_service.record_change(
        EntityKind::Secret,
        &name.0,
        version,
        ChangeOp::Created,
        ChangeActor::Api,
        &principal,
        None,
        // Metadata only; never key material.
        Some(r#"{"versions":1,"status":"active"}"#.to_string()),
    );

    Ok((StatusCode::CREATED, Json(metadata)))
}

/// `GET /api/v1/secrets/{name}` — read plaintext (role-gated, audited).
#[utoipa::path(
    get, path = "/api/v1/secrets/{name}",
    tag = "Secrets",
    params(
        ("name" = String, Path, description = "Secret name"),
        ("version" = Option<u64>, Query, description = "Pin a specific version"),
    ),
    responses(
        (status = 200, description = "Secret plaintext", body = SecretValueResponse),
        (status = 403, description = "Insufficient role", body = ErrorBody),
        (status = 404, description = "Missing or revoked secret", body = ErrorBody),
    )
)]
pub async fn read_secret(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ReadSecretQuery>,
    claims: Option<Extension<JwtClaims>>,
) -> Result<Json<SecretValueResponse>, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_secret_read(claims)?;
    }
    validate_string_length("name", &name, MAX_ID_LENGTH)?;
    let name = SecretName(name);
    let caller = principal_name(&claims);

    let mut svc = state.secrets_service.write().await;
    let (value, version) = match query.version {
        Some(version) => (svc.read_version(&name, version, &caller).await?, version),
        None => {
            let value = svc.read(&name, &caller).await?;
            let version = svc.get(&name)?.active_version().map_or(0, |v| v.version);
            (value, version)
        }
    };

    Ok(Json(SecretValueResponse {
        name: name.0,
        version,
        value,
    }))
}

/// `GET /api/v1/secrets/{name}/metadata` — version chain without
/// plaintext.
#[utoipa::path(
    get, path = "/api/v1/secrets/{name}/metadata",
    tag = "Secrets",
    params(("name" = String, Path, description = "Secret name")),
    responses(
        (status = 200, description = "Secret metadata", body = SecretMetadataResponse),
        (status = 404, description = "Secret not found", body = ErrorBody),
    )
)]
pub async fn secret_metadata(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SecretMetadataResponse>, ApiError> {
    validate_string_length("name", &name, MAX_ID_LENGTH)?;
    let svc = state.secrets_service.read().await;
    let secret = svc.get(&SecretName(name))?;
    Ok(Json(SecretMetadataResponse::from_secret(secret)))
}

/// `POST /api/v1/secrets/{name}/rotate` — out-of-schedule rotation.
#[utoipa::path(
    post, path = "/api/v1/secrets/{name}/rotate",
    tag = "Secrets",
    params(
        ("name" = String, Path, description = "Secret name"),
        ("immediate" = bool, Query, description = "Revoke the previous version immediately"),
    ),
    responses(
        (status = 200, description = "Secret rotated", body = RotateSecretResponse),
        (status = 403, description = "Insufficient role", body = ErrorBody),
        (status = 404, description = "Secret not found", body = ErrorBody),
    )
)]
pub async fn rotate_secret(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<RotateQuery>,
    claims: Option<Extension<JwtClaims>>,
) -> Result<Json<RotateSecretResponse>, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_admin(claims)?;
    }
    validate_string_length("name", &name, MAX_ID_LENGTH)?;
    let name = SecretName(name);
    let principal = principal_name(&claims);

    // The rotation policy's grace period applies when one exists;
    // otherwise rotation is immediate-expiry only when requested.
    let grace_ms = state
        .rotation_service
        .read()
        .await
        .get(&name.0)
        .map(|p| p.grace_period_ms())
        .unwrap_or(0);

    let mut svc = state.secrets_service.write().await;
    let new_version = svc.emergency_rotate(&name, query.immediate, grace_ms)?;
    drop(svc);

    tracing::info!(secret = %name, new_version, immediate = query.immediate, "secret rotated via API");

    state.audit_service.record_change(
        EntityKind::Secret,
        &name.0,
        new_version,
        ChangeOp::Rotated,
        ChangeActor::Api,
        &principal,
        None,
        Some(format!(r#"{{"immediate":{}}}"#, query.immediate)),
    );

    Ok(Json(RotateSecretResponse {
        name: name.0,
        new_version,
    }))
}

/// `POST /api/v1/secrets/{name}/revoke` — revoke one version.
#[utoipa::path(
    post, path = "/api/v1/secrets/{name}/revoke",
    tag = "Secrets",
    params(("name" = String, Path, description = "Secret name")),
    request_body = RevokeSecretRequest,
    responses(
        (status = 204, description = "Version revoked"),
        (status = 403, description = "Insufficient role", body = ErrorBody),
        (status = 404, description = "Secret or version not found", body = ErrorBody),
    )
)]
pub async fn revoke_secret(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    claims: Option<Extension<JwtClaims>>,
    Json(req): Json<RevokeSecretRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_admin(claims)?;
    }
    validate_string_length("name", &name, MAX_ID_LENGTH)?;
    let name = SecretName(name);
    let principal = principal_name(&claims);

    let mut svc = state.secrets_service.write().await;
    svc.revoke(&name, req.version)?;
    drop(svc);

    tracing::info!(secret = %name, version = req.version, "secret version revoked via API");

    state.audit_service.record_change(
        EntityKind::Secret,
        &name.0,
        req.version,
        ChangeOp::Revoked,
        ChangeActor::Api,
        &principal,
        None,
        None,
    );

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/secrets` — list secret metadata.
#[utoipa::path(
    get, path = "/api/v1/secrets",
    tag = "Secrets",
    responses((status = 200, description = "All secrets (metadata only)", body = Vec<SecretMetadataResponse>))
)]
pub async fn list_secrets(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<SecretMetadataResponse>> {
    let svc = state.secrets_service.read().await;
    Json(
        svc.secrets()
            .map(SecretMetadataResponse::from_secret)
            .collect(),
    )
}

fn principal_name(claims: &Option<Extension<JwtClaims>>) -> String {
    claims
        .as_ref()
        .map_or_else(|| "anonymous".to_string(), |Extension(c)| c.sub.clone())
}
