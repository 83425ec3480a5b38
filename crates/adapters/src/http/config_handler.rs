use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use domain::audit::entity::{ChangeActor, ChangeOp};
use domain::auth::entity::JwtClaims;
use domain::common::entity::{EntityKind, Environment};
use domain::config::entity::{ConfigChange, ConfigEntry, ConfigKey};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{ApiError, ErrorBody};
use super::middleware::rbac::require_environment_write;
use super::state::AppState;
use super::validation::{MAX_ID_LENGTH, MAX_SHORT_STRING_LENGTH, validate_string_length};

// ── Request / Response DTOs ─────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct EnvironmentQuery {
    /// Environment to resolve against; defaults to `global`.
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PutConfigRequest {
    pub value: String,
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ConfigEntryResponse {
    pub key: String,
    pub environment: String,
    pub value: String,
    pub version: u64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub created_by: String,
    pub updated_by: String,
}

impl ConfigEntryResponse {
    fn from_entry(entry: &ConfigEntry) -> Self {
        Self {
            key: entry.key.0.clone(),
            environment: entry.environment.0.clone(),
            value: entry.value.clone(),
            version: entry.version,
            created_at_ms: entry.created_at_ms,
            updated_at_ms: entry.updated_at_ms,
            created_by: entry.created_by.clone(),
            updated_by: entry.updated_by.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PutConfigResponse {
    pub key: String,
    pub environment: String,
    pub version: u64,
}

#[derive(Serialize, ToSchema)]
pub struct ConfigChangeResponse {
    pub version: u64,
    pub value: String,
    pub changed_by: String,
    pub changed_at_ms: u64,
    pub deleted: bool,
}

impl ConfigChangeResponse {
    fn from_change(change: &ConfigChange) -> Self {
        Self {
            version: change.version,
            value: change.value.clone(),
            changed_by: change.changed_by.clone(),
            changed_at_ms: change.changed_at_ms,
            deleted: change.deleted,
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// `GET /api/v1/config/{key}` — resolve a config entry with environment
/// inheritance.
#[utoipa::path(
    get, path = "/api/v1/config/{key}",
    tag = "Config",
    params(
        ("key" = String, Path, description = "Config key"),
        ("environment" = Option<String>, Query, description = "Environment (default: global)"),
    ),
    responses(
        (status = 200, description = "Resolved entry", body = ConfigEntryResponse),
        (status = 404, description = "Entry not found", body = ErrorBody),
    )
)]
pub async fn get_config_entry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Json<ConfigEntryResponse>, ApiError> {
    let (key, environment) = parse_target(&key, query.environment.as_deref())?;
    let svc = state.config_service.read().await;
    let entry = svc.get(&key, &environment)?;
    Ok(Json(ConfigEntryResponse::from_entry(entry)))
}

/// `PUT /api/v1/config/{key}` — versioned write guarded by `If-Match`.
#[utoipa::path(
    put, path = "/api/v1/config/{key}",
    tag = "Config",
    params(
        ("key" = String, Path, description = "Config key"),
        ("If-Match" = u64, Header, description = "Expected current version (0 to create)"),
    ),
    request_body = PutConfigRequest,
    responses(
        (status = 200, description = "Write applied", body = PutConfigResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 409, description = "Version conflict", body = ErrorBody),
    )
)]
pub async fn put_config_entry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    claims: Option<Extension<JwtClaims>>,
    Json(req): Json<PutConfigRequest>,
) -> Result<Json<PutConfigResponse>, ApiError> {
    let (key, environment) = parse_target(&key, req.environment.as_deref())?;
    if let Some(Extension(ref claims)) = claims {
        require_environment_write(claims, &environment)?;
    }
    let expected_version = parse_if_match(&headers)?;
    let principal = principal_name(&claims);

    let before = {
        let svc = state.config_service.read().await;
        svc.get(&key, &environment)
            .ok()
            .filter(|e| e.environment == environment)
            .and_then(|e| serde_json::to_string(e).ok())
    };

    let mut svc = state.config_service.write().await;
    let version = svc.put(
        key.clone(),
        environment.clone(),
        req.value,
        expected_version,
        &principal,
    )?;
    let after = svc
        .get(&key, &environment)
        .ok()
        .and_then(|e| serde_json::to_string(e).ok());
    drop(svc);

    tracing::info!(key = %key, environment = %environment, version, "config entry written via API");

    state.audit_service.record_change(
        EntityKind::Config,
        &format!("{environment}/{key}"),
        version,
        if expected_version == 0 {
            ChangeOp::Created
        } else {
            ChangeOp::Updated
        },
        ChangeActor::Api,
        &principal,
        before,
        after,
    );

    Ok(Json(PutConfigResponse {
        key: key.0,
        environment: environment.0,
        version,
    }))
}

/// `DELETE /api/v1/config/{key}` — versioned soft delete.
#[utoipa::path(
    delete, path = "/api/v1/config/{key}",
    tag = "Config",
    params(
        ("key" = String, Path, description = "Config key"),
        ("environment" = Option<String>, Query, description = "Environment (default: global)"),
        ("If-Match" = u64, Header, description = "Expected current version"),
    ),
    responses(
        (status = 204, description = "Entry tombstoned"),
        (status = 404, description = "Entry not found", body = ErrorBody),
        (status = 409, description = "Version conflict", body = ErrorBody),
    )
)]
pub async fn delete_config_entry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<EnvironmentQuery>,
    headers: HeaderMap,
    claims: Option<Extension<JwtClaims>>,
) -> Result<impl IntoResponse, ApiError> {
    let (key, environment) = parse_target(&key, query.environment.as_deref())?;
    if let Some(Extension(ref claims)) = claims {
        require_environment_write(claims, &environment)?;
    }
    let expected_version = parse_if_match(&headers)?;
    let principal = principal_name(&claims);

    let before = {
        let svc = state.config_service.read().await;
        svc.get(&key, &environment)
            .ok()
            .and_then(|e| serde_json::to_string(e).ok())
    };

    let mut svc = state.config_service.write().await;
    let version = svc.delete(&key, &environment, expected_version, &principal)?;
    drop(svc);

    tracing::info!(key = %key, environment = %environment, version, "config entry deleted via API");

    state.audit_service.record_change(
        EntityKind::Config,
        &format!("{environment}/{key}"),
        version,
        ChangeOp::Deleted,
        ChangeActor::Api,
        &principal,
        before,
        None,
    );

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/config/{key}/history` — full append-only change list.
#[utoipa::path(
    get, path = "/api/v1/config/{key}/history",
    tag = "Config",
    params(
        ("key" = String, Path, description = "Config key"),
        ("environment" = Option<String>, Query, description = "Environment (default: global)"),
    ),
    responses(
        (status = 200, description = "Change history", body = Vec<ConfigChangeResponse>),
        (status = 404, description = "Entry not found", body = ErrorBody),
    )
)]
pub async fn get_config_history(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Json<Vec<ConfigChangeResponse>>, ApiError> {
    let (key, environment) = parse_target(&key, query.environment.as_deref())?;
    let svc = state.config_service.read().await;
    let history = svc.history(&key, &environment)?;
    Ok(Json(history.iter().map(ConfigChangeResponse::from_change).collect()))
}

// ── Request parsing ─────────────────────────────────────────────────

fn parse_target(key: &str, environment: Option<&str>) -> Result<(ConfigKey, Environment), ApiError> {
    validate_string_length("key", key, MAX_ID_LENGTH)?;
    let environment = environment.unwrap_or(domain::common::entity::GLOBAL_ENVIRONMENT);
    validate_string_length("environment", environment, MAX_SHORT_STRING_LENGTH)?;
    Ok((
        ConfigKey(key.to_string()),
        Environment(environment.to_string()),
    ))
}

/// Parse the `If-Match` header as an expected version. The header is
/// required for writes; `0` means "create".
fn parse_if_match(headers: &HeaderMap) -> Result<u64, ApiError> {
    let value = headers
        .get(axum::http::header::IF_MATCH)
        .ok_or_else(|| ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: "If-Match header is required (use 0 to create)".to_string(),
        })?
        .to_str()
        .map_err(|_| ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: "If-Match header is not valid ASCII".to_string(),
        })?;

    value
        .trim_matches('"')
        .parse::<u64>()
        .map_err(|_| ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: format!("If-Match header '{value}' is not a version number"),
        })
}

fn principal_name(claims: &Option<Extension<JwtClaims>>) -> String {
    claims
        .as_ref()
        .map_or_else(|| "anonymous".to_string(), |Extension(c)| c.sub.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::state::test_support::make_test_state;
    use axum::http::header::IF_MATCH;

    fn if_match(version: u64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, version.to_string().parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn put_then_get_round_trip() {
        let state = make_test_state();

        let resp = put_config_entry(
            State(Arc::clone(&state)),
            Path("db.timeout".to_string()),
            if_match(0),
            None,
            Json(PutConfigRequest {
                value: "30".to_string(),
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.0.version, 1);

        let entry = get_config_entry(
            State(state),
            Path("db.timeout".to_string()),
            Query(EnvironmentQuery {
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(entry.0.value, "30");
        assert_eq!(entry.0.version, 1);
    }

    #[tokio::test]
    async fn if_match_scenario() {
        // v1 write, If-Match:1 update → v2, stale If-Match:1 → 409.
        let state = make_test_state();

        put_config_entry(
            State(Arc::clone(&state)),
            Path("db.timeout".to_string()),
            if_match(0),
            None,
            Json(PutConfigRequest {
                value: "30".to_string(),
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap();

        let resp = put_config_entry(
            State(Arc::clone(&state)),
            Path("db.timeout".to_string()),
            if_match(1),
            None,
            Json(PutConfigRequest {
                value: "60".to_string(),
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.0.version, 2);

        let err = put_config_entry(
            State(state),
            Path("db.timeout".to_string()),
            if_match(1),
            None,
            Json(PutConfigRequest {
                value: "90".to_string(),
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[tokio::test]
    async fn missing_if_match_rejected() {
        let state = make_test_state();
        let err = put_config_entry(
            State(state),
            Path("db.timeout".to_string()),
            HeaderMap::new(),
            None,
            Json(PutConfigRequest {
                value: "30".to_string(),
                environment: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn environment_defaults_to_global_with_inheritance() {
        let state = make_test_state();

        put_config_entry(
            State(Arc::clone(&state)),
            Path("log.level".to_string()),
            if_match(0),
            None,
            Json(PutConfigRequest {
                value: "info".to_string(),
                environment: None,
            }),
        )
        .await
        .unwrap();

        // A prod lookup falls back to the global entry.
        let entry = get_config_entry(
            State(state),
            Path("log.level".to_string()),
            Query(EnvironmentQuery {
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(entry.0.environment, "global");
        assert_eq!(entry.0.value, "info");
    }

    #[tokio::test]
    async fn history_lists_all_versions() {
        let state = make_test_state();
        for (expected, value) in [(0, "30"), (1, "60"), (2, "90")] {
            put_config_entry(
                State(Arc::clone(&state)),
                Path("db.timeout".to_string()),
                if_match(expected),
                None,
                Json(PutConfigRequest {
                    value: value.to_string(),
                    environment: Some("prod".to_string()),
                }),
            )
            .await
            .unwrap();
        }

        let history = get_config_history(
            State(state),
            Path("db.timeout".to_string()),
            Query(EnvironmentQuery {
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(history.0.len(), 3);
        assert_eq!(history.0[2].version, 3);
        assert_eq!(history.0[2].value, "90");
    }

    #[tokio::test]
    async fn delete_tombstones_entry() {
        let state = make_test_state();
        put_config_entry(
            State(Arc::clone(&state)),
            Path("db.timeout".to_string()),
            if_match(0),
            None,
            Json(PutConfigRequest {
                value: "30".to_string(),
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap();

        delete_config_entry(
            State(Arc::clone(&state)),
            Path("db.timeout".to_string()),
            Query(EnvironmentQuery {
                environment: Some("prod".to_string()),
            }),
            if_match(1),
            None,
        )
        .await
        .unwrap();

        let err = get_config_entry(
            State(state),
            Path("db.timeout".to_string()),
            Query(EnvironmentQuery {
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_key_rejected() {
        let state = make_test_state();
        let err = put_config_entry(
            State(state),
            Path("bad key!".to_string()),
            if_match(0),
            None,
            Json(PutConfigRequest {
                value: "x".to_string(),
                environment: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn writes_record_audit_trail() {
        let state = make_test_state();
        put_config_entry(
            State(Arc::clone(&state)),
            Path("db.timeout".to_string()),
            if_match(0),
            None,
            Json(PutConfigRequest {
                value: "30".to_string(),
                environment: Some("prod".to_string()),
            }),
        )
        .await
        .unwrap();

        let records = state
            .audit_service
            .query(&domain::audit::query::ChangeQuery::default())
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_key, "prod/db.timeout");
        assert_eq!(records[0].op, ChangeOp::Created);
    }
}
