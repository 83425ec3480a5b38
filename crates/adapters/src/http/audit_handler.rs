use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use domain::audit::entity::ChangeRecord;
use domain::audit::query::ChangeQuery;
use domain::common::entity::EntityKind;
use domain::secrets::query::AccessLogQuery;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{ApiError, ErrorBody};
use super::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 1000;

// ── Request / Response DTOs ─────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct ChangeLogParams {
    /// Filter by entity kind: `config`, `secret`, or `policy`.
    #[serde(default)]
    pub kind: Option<String>,
    /// Filter by entity key (exact match).
    #[serde(default)]
    pub entity_key: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Deserialize, ToSchema)]
pub struct AccessLogParams {
    /// Filter by secret name (exact match).
    #[serde(default)]
    pub secret_name: Option<String>,
    /// Filter by accessing principal.
    #[serde(default)]
    pub accessed_by: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct ChangeRecordResponse {
    pub kind: String,
    pub entity_key: String,
    pub version: u64,
    pub timestamp_ms: u64,
    pub op: String,
    pub actor: String,
    pub principal: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl ChangeRecordResponse {
    fn from_record(record: &ChangeRecord) -> Self {
        Self {
            kind: record.kind.as_str().to_string(),
            entity_key: record.entity_key.clone(),
            version: record.version,
            timestamp_ms: record.timestamp_ms,
            op: record.op.as_str().to_string(),
            actor: record.actor.as_str().to_string(),
            principal: record.principal.clone(),
            before: record.before.clone(),
            after: record.after.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AccessRecordResponse {
    pub secret_name: String,
    pub version: u64,
    pub accessed_by: String,
    pub accessed_at_ms: u64,
    pub success: bool,
}

// ── Handlers ────────────────────────────────────────────────────────

/// `GET /api/v1/audit/changes` — the mutation audit trail, newest first.
#[utoipa::path(
    get, path = "/api/v1/audit/changes",
    tag = "Audit",
    params(
        ("kind" = Option<String>, Query, description = "Entity kind filter"),
        ("entity_key" = Option<String>, Query, description = "Entity key filter"),
        ("limit" = Option<usize>, Query, description = "Page size (max 1000)"),
        ("offset" = Option<usize>, Query, description = "Records to skip"),
    ),
    responses(
        (status = 200, description = "Matching change records", body = Vec<ChangeRecordResponse>),
        (status = 400, description = "Invalid filter", body = ErrorBody),
    )
)]
pub async fn list_changes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChangeLogParams>,
) -> Result<Json<Vec<ChangeRecordResponse>>, ApiError> {
    let kind = match params.kind.as_deref() {
        None => None,
        Some(s) => Some(EntityKind::parse_name(s).ok_or_else(|| ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: format!("invalid kind '{s}': expected config, secret, or policy"),
        })?),
    };

    let query = ChangeQuery {
        kind,
        entity_key: params.entity_key,
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
        offset: params.offset.unwrap_or(0),
        ..Default::default()
    };

    let records = state.audit_service.query(&query)?;
    Ok(Json(records.iter().map(ChangeRecordResponse::from_record).collect()))
}

/// `GET /api/v1/audit/secret-access` — the secret access log, newest
/// first.
#[utoipa::path(
    get, path = "/api/v1/audit/secret-access",
    tag = "Audit",
    params(
        ("secret_name" = Option<String>, Query, description = "Secret name filter"),
        ("accessed_by" = Option<String>, Query, description = "Principal filter"),
        ("limit" = Option<usize>, Query, description = "Page size (max 1000)"),
        ("offset" = Option<usize>, Query, description = "Records to skip"),
    ),
    responses((status = 200, description = "Matching access records", body = Vec<AccessRecordResponse>))
)]
pub async fn list_secret_access(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccessLogParams>,
) -> Result<Json<Vec<AccessRecordResponse>>, ApiError> {
    let query = AccessLogQuery {
        secret_name: params.secret_name,
        accessed_by: params.accessed_by,
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
        offset: params.offset.unwrap_or(0),
        ..Default::default()
    };

    let svc = state.secrets_service.read().await;
    let records = svc.access_log(&query)?;
    Ok(Json(
        records
            .into_iter()
            .map(|r| AccessRecordResponse {
                secret_name: r.secret_name,
                version: r.version,
                accessed_by: r.accessed_by,
                accessed_at_ms: r.accessed_at_ms,
                success: r.success,
            })
            .collect(),
    ))
}
