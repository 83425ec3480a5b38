use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("invalid rotation policy: {0}")]
    InvalidPolicy(String),

    #[error("rotation interval too short: {interval_secs}s (minimum 60s)")]
    IntervalTooShort { interval_secs: u64 },

    #[error("duplicate rotation policy for secret: {name}")]
    DuplicatePolicy { name: String },

    #[error("rotation policy not found for secret: {name}")]
    PolicyNotFound { name: String },
}

impl From<RotationError> for DomainError {
    fn from(e: RotationError) -> Self {
        match e {
            RotationError::PolicyNotFound { name } => Self::NotFound(name),
            RotationError::DuplicatePolicy { name } => Self::DuplicateEntry(name),
            RotationError::InvalidPolicy(_) | RotationError::IntervalTooShort { .. } => {
                Self::InvalidInput(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_to_domain_error() {
        let e: DomainError = RotationError::PolicyNotFound {
            name: "api-key".to_string(),
        }
        .into();
        assert!(matches!(e, DomainError::NotFound(_)));
    }

    #[test]
    fn duplicate_to_domain_error() {
        let e: DomainError = RotationError::DuplicatePolicy {
            name: "api-key".to_string(),
        }
        .into();
        assert!(matches!(e, DomainError::DuplicateEntry(_)));
    }

    #[test]
    fn interval_to_domain_error() {
        let e: DomainError = RotationError::IntervalTooShort { interval_secs: 5 }.into();
        assert!(matches!(e, DomainError::InvalidInput(_)));
    }
}
