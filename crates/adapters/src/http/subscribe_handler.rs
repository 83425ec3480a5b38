use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use domain::common::entity::EntityKind;
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

use super::error::ApiError;
use super::state::AppState;
use super::validation::{MAX_ID_LENGTH, validate_string_length};

#[derive(Deserialize, ToSchema)]
pub struct SubscribeQuery {
    /// Entity kind: `config`, `secret`, or `policy`.
    pub kind: String,
    /// Stream key (e.g. `prod/db.timeout` for config entries).
    pub key: String,
    /// Last version the subscriber has acknowledged; buffered events
    /// after it are replayed before live delivery.
    #[serde(default)]
    pub since_version: u64,
}

/// `GET /api/v1/subscribe` — long-lived SSE stream of change events for
/// one `(kind, key)` stream.
///
/// Delivery is at-least-once and in version order per stream; consumers
/// dedupe on `(kind, key, version)`. If the subscriber falls too far
/// behind, the stream ends and it must reconnect with the last
/// acknowledged `since_version`.
#[utoipa::path(
    get, path = "/api/v1/subscribe",
    tag = "Change Propagation",
    params(
        ("kind" = String, Query, description = "Entity kind: config | secret | policy"),
        ("key" = String, Query, description = "Stream key"),
        ("since_version" = u64, Query, description = "Resume after this version"),
    ),
    responses(
        (status = 200, description = "SSE stream of change events"),
        (status = 400, description = "Unknown entity kind"),
    )
)]
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    validate_string_length("key", &query.key, MAX_ID_LENGTH)?;
    let kind = EntityKind::parse_name(&query.kind).ok_or_else(|| ApiError::BadRequest {
        code: "VALIDATION_ERROR",
        message: format!(
            "invalid kind '{}': expected config, secret, or policy",
            query.kind
        ),
    })?;

    let rx = state
        .propagator
        .subscribe(kind, query.key.clone(), query.since_version)
        .await;

    tracing::debug!(kind = %kind, key = %query.key, since_version = query.since_version, "change subscriber connected");

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default()
            .event("change")
            .id(event.version.to_string())
            .data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
