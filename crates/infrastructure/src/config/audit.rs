//! Change audit trail configuration.

use serde::{Deserialize, Serialize};

use super::common::{ConfigError, default_true};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Change log cap; oldest records are evicted beyond this.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Records older than this are swept by the cleanup task.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_max_entries() -> usize {
    100_000
}

fn default_retention_days() -> u32 {
    90
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            retention_days: default_retention_days(),
        }
    }
}

impl AuditConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::Validation {
                field: "audit.max_entries".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        if self.retention_days == 0 {
            return Err(ConfigError::Validation {
                field: "audit.retention_days".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
