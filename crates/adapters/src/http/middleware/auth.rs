use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::super::error::ApiError;
use super::super::state::AppState;

/// Axum middleware that validates authentication via the `AuthProvider`.
///
/// Expects `Authorization: Bearer <token>`. When no `auth_provider` is
/// configured in state, requests pass through (auth disabled).
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(ref auth_provider) = state.auth_provider else {
        return Ok(next.run(request).await);
    };

    let token = extract_token(&request)?;
    let claims = auth_provider.validate_token(token)?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Extract the bearer token from the `Authorization` header.
fn extract_token(request: &Request) -> Result<&str, ApiError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Some(token) = header.and_then(|h| h.strip_prefix("Bearer ")) {
        return Ok(token);
    }

    Err(ApiError::Unauthorized {
        message: "authentication required: no bearer token provided".to_string(),
    })
}
