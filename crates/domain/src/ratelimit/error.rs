use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("duplicate rule: {id}")]
    DuplicateRule { id: String },

    #[error("rule not found: {id}")]
    RuleNotFound { id: String },

    #[error("invalid limit: must be > 0")]
    InvalidLimit,

    #[error("invalid window: must be > 0")]
    InvalidWindow,

    #[error("invalid burst capacity: must be > 0 for token bucket")]
    InvalidBurst,
}

impl From<RateLimitError> for DomainError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::RuleNotFound { id } => Self::NotFound(id),
            RateLimitError::DuplicateRule { id } => Self::DuplicateEntry(id),
            RateLimitError::InvalidRule(msg) => Self::InvalidInput(msg),
            RateLimitError::InvalidLimit
            | RateLimitError::InvalidWindow
            | RateLimitError::InvalidBurst => Self::InvalidInput(e.to_string()),
        }
    }
}
