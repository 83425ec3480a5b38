use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("secret not found: {name}")]
    SecretNotFound { name: String },

    #[error("secret version not found or revoked: {name} v{version}")]
    VersionNotFound { name: String, version: u64 },

    #[error("duplicate secret: {name}")]
    DuplicateSecret { name: String },

    #[error("invalid secret name: {0}")]
    InvalidName(String),

    #[error("secret has no active version: {name}")]
    NoActiveVersion { name: String },
}

impl From<SecretsError> for DomainError {
    fn from(e: SecretsError) -> Self {
        match e {
            SecretsError::SecretNotFound { name } => Self::NotFound(name),
            SecretsError::VersionNotFound { name, version } => {
                Self::NotFound(format!("{name} v{version}"))
            }
            SecretsError::NoActiveVersion { name } => Self::NotFound(name),
            SecretsError::DuplicateSecret { name } => Self::DuplicateEntry(name),
            SecretsError::InvalidName(msg) => Self::InvalidInput(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_to_domain_error() {
        let e: DomainError = SecretsError::SecretNotFound {
            name: "api-key".to_string(),
        }
        .into();
        assert!(matches!(e, DomainError::NotFound(_)));
    }

    #[test]
    fn revoked_version_to_not_found() {
        let e: DomainError = SecretsError::VersionNotFound {
            name: "api-key".to_string(),
            version: 1,
        }
        .into();
        assert!(matches!(e, DomainError::NotFound(_)));
    }

    #[test]
    fn duplicate_to_domain_error() {
        let e: DomainError = SecretsError::DuplicateSecret {
            name: "api-key".to_string(),
        }
        .into();
        assert!(matches!(e, DomainError::DuplicateEntry(_)));
    }

    #[test]
    fn invalid_name_to_domain_error() {
        let e: DomainError = SecretsError::InvalidName("bad".to_string()).into();
        assert!(matches!(e, DomainError::InvalidInput(_)));
    }
}
