use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::auth::error::AuthError;
use domain::common::error::DomainError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub(crate) struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize, ToSchema)]
pub(crate) struct ErrorDetail {
    /// Machine-readable error code (e.g. `VERSION_CONFLICT`).
    #[schema(value_type = String)]
    code: &'static str,
    /// Human-readable description of the error.
    message: String,
}

/// Standard API error type.
///
/// All variants produce a JSON response matching:
/// `{"error":{"code":"SCREAMING_SNAKE","message":"human-readable"}}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound { code: &'static str, message: String },
    BadRequest { code: &'static str, message: String },
    Unauthorized { message: String },
    Forbidden { code: &'static str, message: String },
    Conflict { code: &'static str, message: String },
    Internal { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::Unauthorized { message } => {
                (StatusCode::UNAUTHORIZED, "AUTHENTICATION_REQUIRED", message)
            }
            Self::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            Self::Internal { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
        };

        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden(ref msg) => Self::Forbidden {
                code: "FORBIDDEN",
                message: msg.clone(),
            },
            _ => Self::Unauthorized {
                message: err.to_string(),
            },
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::NotFound(_) => Self::NotFound {
                code: "NOT_FOUND",
                message: err.to_string(),
            },
            DomainError::VersionConflict { .. } => Self::Conflict {
                code: "VERSION_CONFLICT",
                message: err.to_string(),
            },
            DomainError::DuplicateEntry(_) => Self::Conflict {
                code: "DUPLICATE_ENTRY",
                message: err.to_string(),
            },
            DomainError::InvalidInput(_) => Self::BadRequest {
                code: "VALIDATION_ERROR",
                message: err.to_string(),
            },
            DomainError::EncryptionFailed(_) => Self::Internal {
                message: "encryption failure".to_string(),
            },
            DomainError::AuditFailed(_) => Self::Internal {
                message: "audit write failure".to_string(),
            },
            DomainError::EvaluationFailed(_) | DomainError::StoreFailed(_) => Self::Internal {
                message: err.to_string(),
            },
        }
    }
}
