//! Secrets vault configuration.

use serde::{Deserialize, Serialize};

use super::common::{ConfigError, default_true};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the master key file (32 raw bytes, created on first run).
    #[serde(default = "default_master_key_path")]
    pub master_key_path: String,

    /// Fail-closed bound on the audit-then-decrypt read path.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Access log cap; oldest records are evicted beyond this.
    #[serde(default = "default_access_log_max_entries")]
    pub access_log_max_entries: usize,
}

fn default_master_key_path() -> String {
    crate::constants::DEFAULT_MASTER_KEY_PATH.to_string()
}

fn default_read_timeout_secs() -> u64 {
    5
}

fn default_access_log_max_entries() -> usize {
    100_000
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            master_key_path: default_master_key_path(),
            read_timeout_secs: default_read_timeout_secs(),
            access_log_max_entries: default_access_log_max_entries(),
        }
    }
}

impl SecretsConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.master_key_path.is_empty() {
            return Err(ConfigError::Validation {
                field: "secrets.master_key_path".to_string(),
                message: "must not be empty when secrets are enabled".to_string(),
            });
        }
        if self.read_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "secrets.read_timeout_secs".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        if self.access_log_max_entries == 0 {
            return Err(ConfigError::Validation {
                field: "secrets.access_log_max_entries".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SecretsConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_key_path_rejected_when_enabled() {
        let cfg = SecretsConfig {
            master_key_path: String::new(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = SecretsConfig {
            read_timeout_secs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_from_yaml() {
        let cfg: SecretsConfig =
            serde_yaml_ng::from_str("master_key_path: /tmp/key\nread_timeout_secs: 2\n").unwrap();
        assert_eq!(cfg.master_key_path, "/tmp/key");
        assert_eq!(cfg.read_timeout_secs, 2);
        assert!(cfg.enabled);
    }
}
