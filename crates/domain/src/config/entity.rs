use serde::{Deserialize, Serialize};

use crate::common::entity::Environment;

use super::error::ConfigError;

/// Maximum length of a config key.
pub const MAX_KEY_LENGTH: usize = 256;
/// Maximum size of a config value in bytes.
pub const MAX_VALUE_SIZE: usize = 64 * 1024;

/// A config key, unique within an environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigKey(pub String);

impl ConfigKey {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            return Err(ConfigError::InvalidKey("key must not be empty".to_string()));
        }
        if self.0.len() > MAX_KEY_LENGTH {
            return Err(ConfigError::InvalidKey(format!(
                "key exceeds {MAX_KEY_LENGTH} characters"
            )));
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
        {
            return Err(ConfigError::InvalidKey(format!(
                "key '{}' contains invalid characters",
                self.0
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A versioned config entry.
///
/// `version` starts at 1 and increments on every mutation, including soft
/// deletes. It always equals the length of the entry's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: ConfigKey,
    pub environment: Environment,
    pub value: String,
    pub version: u64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub created_by: String,
    pub updated_by: String,
    /// Soft-delete tombstone. Deleted entries stop resolving but keep
    /// their history and version counter.
    pub deleted: bool,
}

/// One append-only history record for a config entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChange {
    pub version: u64,
    pub value: String,
    pub changed_by: String,
    pub changed_at_ms: u64,
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_valid() {
        assert!(ConfigKey("db.timeout".to_string()).validate().is_ok());
        assert!(ConfigKey("service/http_port".to_string()).validate().is_ok());
    }

    #[test]
    fn key_empty() {
        assert!(ConfigKey(String::new()).validate().is_err());
    }

    #[test]
    fn key_too_long() {
        assert!(ConfigKey("k".repeat(MAX_KEY_LENGTH + 1)).validate().is_err());
    }

    #[test]
    fn key_invalid_chars() {
        assert!(ConfigKey("bad key".to_string()).validate().is_err());
        assert!(ConfigKey("bad\tkey".to_string()).validate().is_err());
    }
}
