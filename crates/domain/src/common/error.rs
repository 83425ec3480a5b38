use thiserror::Error;

use crate::audit::error::AuditError;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("version conflict on '{key}': expected {expected}, current {current}")]
    VersionConflict {
        key: String,
        expected: u64,
        current: u64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("encryption failure: {0}")]
    EncryptionFailed(String),

    #[error("audit write failure: {0}")]
    AuditFailed(String),

    #[error("policy evaluation failure: {0}")]
    EvaluationFailed(String),

    #[error("store failure: {0}")]
    StoreFailed(String),
}

impl From<AuditError> for DomainError {
    fn from(err: AuditError) -> Self {
        Self::AuditFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_conflict_message() {
        let e = DomainError::VersionConflict {
            key: "db.timeout".to_string(),
            expected: 1,
            current: 2,
        };
        assert_eq!(
            e.to_string(),
            "version conflict on 'db.timeout': expected 1, current 2"
        );
    }

    #[test]
    fn audit_error_maps_to_audit_failed() {
        let e: DomainError = AuditError::WriteFailed("disk full".to_string()).into();
        assert!(matches!(e, DomainError::AuditFailed(_)));
    }
}
