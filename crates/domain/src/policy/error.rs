use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("duplicate rule id in policy: {id}")]
    DuplicateRuleId { id: String },

    #[error("policy not found: {id}")]
    PolicyNotFound { id: String },

    #[error("version conflict on policy '{id}': expected {expected}, current {current}")]
    VersionConflict {
        id: String,
        expected: u64,
        current: u64,
    },

    #[error("policy snapshot unavailable: {id} v{version}")]
    SnapshotUnavailable { id: String, version: u64 },
}

impl From<PolicyError> for DomainError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::PolicyNotFound { id } => Self::NotFound(id),
            PolicyError::VersionConflict {
                id,
                expected,
                current,
            } => Self::VersionConflict {
                key: id,
                expected,
                current,
            },
            PolicyError::SnapshotUnavailable { .. } => Self::EvaluationFailed(e.to_string()),
            PolicyError::InvalidPolicy(_) | PolicyError::DuplicateRuleId { .. } => {
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
        let e: DomainError = PolicyError::PolicyNotFound {
            id: "p1".to_string(),
        }
        .into();
        assert!(matches!(e, DomainError::NotFound(_)));
    }

    #[test]
    fn conflict_to_domain_error() {
        let e: DomainError = PolicyError::VersionConflict {
            id: "p1".to_string(),
            expected: 1,
            current: 2,
        }
        .into();
        assert!(matches!(e, DomainError::VersionConflict { .. }));
    }

    #[test]
    fn snapshot_to_evaluation_failed() {
        let e: DomainError = PolicyError::SnapshotUnavailable {
            id: "p1".to_string(),
            version: 3,
        }
        .into();
        assert!(matches!(e, DomainError::EvaluationFailed(_)));
    }

    #[test]
    fn invalid_to_domain_error() {
        let e: DomainError = PolicyError::InvalidPolicy("bad".to_string()).into();
        assert!(matches!(e, DomainError::InvalidInput(_)));
    }
}
