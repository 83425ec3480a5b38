use thiserror::Error;

use crate::common::error::DomainError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("version conflict on '{key}': expected {expected}, current {current}")]
    VersionConflict {
        key: String,
        expected: u64,
        current: u64,
    },

    #[error("config entry not found: {key}")]
    EntryNotFound { key: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("value too large: {size} bytes (max {max})")]
    ValueTooLarge { size: usize, max: usize },
}

impl From<ConfigError> for DomainError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::VersionConflict {
                key,
                expected,
                current,
            } => Self::VersionConflict {
                key,
                expected,
                current,
            },
            ConfigError::EntryNotFound { key } => Self::NotFound(key),
            ConfigError::InvalidKey(_)
            | ConfigError::InvalidEnvironment(_)
            | ConfigError::ValueTooLarge { .. } => Self::InvalidInput(e.to_string()),
        }
    }
}
