//! Agent configuration: structs, parsing, and validation.
//!
//! The config module is split across several sub-modules:
//! - `common`: shared helpers and `ConfigError`
//! - `secrets`, `rotation`, `ratelimit`, `propagation`, `audit`,
//!   `auth`: section-specific configs

mod audit;
mod auth;
mod common;
mod propagation;
mod ratelimit;
mod rotation;
mod secrets;

pub use audit::AuditConfig;
pub use auth::AuthConfig;
pub use common::{ConfigError, warn_if_world_readable};
pub use propagation::PropagationConfig;
pub use ratelimit::{RateLimitRuleConfig, RateLimitSectionConfig};
pub use rotation::{RotationConfig, RotationPolicyConfig};
pub use secrets::SecretsConfig;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_HTTP_PORT};
use common::{MAX_RATELIMIT_RULES, MAX_ROTATION_POLICIES, check_limit};

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StewardConfig {
    pub agent: AgentInfo,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub rotation: RotationConfig,

    #[serde(default)]
    pub ratelimit: RateLimitSectionConfig,

    #[serde(default)]
    pub propagation: PropagationConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

impl StewardConfig {
    /// Load config from a YAML file.
    ///
    /// On Unix, logs a warning if the config file is readable by
    /// group/other, since it may contain the JWT secret.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        warn_if_world_readable(path, "config file");
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.agent.validate()?;
        self.secrets.validate()?;
        self.rotation.validate()?;
        self.propagation.validate()?;
        self.audit.validate()?;
        self.auth.validate()?;

        check_limit("ratelimit.rules", self.ratelimit.rules.len(), MAX_RATELIMIT_RULES)?;
        for (idx, rule) in self.ratelimit.rules.iter().enumerate() {
            rule.validate(idx)?;
        }
        check_limit(
            "rotation.policies",
            self.rotation.policies.len(),
            MAX_ROTATION_POLICIES,
        )?;
        Ok(())
    }
}

// ── Agent section ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Instance name; also the holder id for rotation leases.
    pub name: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Directory for redb databases.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Serve the Swagger UI at `/docs`.
    #[serde(default)]
    pub swagger_ui: bool,
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}

impl AgentInfo {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Validation {
                field: "agent.name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.http_port == 0 {
            return Err(ConfigError::Validation {
                field: "agent.http_port".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

// ── Logging enums ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Flattened JSON for log aggregators.
    Json,
    /// Human-readable colored output for development.
    #[default]
    Text,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses() {
        let config = StewardConfig::from_yaml("agent:\n  name: steward-1\n").unwrap();
        assert_eq!(config.agent.name, "steward-1");
        assert_eq!(config.agent.http_port, DEFAULT_HTTP_PORT);
        assert!(config.secrets.enabled);
        assert!(config.ratelimit.enabled);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(StewardConfig::from_yaml("agent:\n  name: x\nmystery: true\n").is_err());
    }

    #[test]
    fn empty_name_rejected() {
        assert!(StewardConfig::from_yaml("agent:\n  name: ''\n").is_err());
    }

    #[test]
    fn full_config_parses() {
        let yaml = r"
agent:
  name: steward-1
  http_port: 8081
  log_level: debug
  log_format: json
  swagger_ui: true
secrets:
  master_key_path: /tmp/master.key
  read_timeout_secs: 2
rotation:
  tick_secs: 10
  policies:
    - secret_name: api-key
      interval_secs: 86400
      grace_period_secs: 3600
ratelimit:
  rules:
    - id: rl-api
      scope: user
      algorithm: token_bucket
      limit: 100
      window_secs: 60
      burst_capacity: 200
propagation:
  queue_capacity: 512
audit:
  max_entries: 1000
auth:
  enabled: true
  jwt_secret: 0123456789abcdef0123456789abcdef
  metrics_auth_required: true
";
        let config = StewardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.agent.http_port, 8081);
        assert_eq!(config.agent.log_level, LogLevel::Debug);
        assert_eq!(config.agent.log_format, LogFormat::Json);
        assert_eq!(config.rotation.policies.len(), 1);
        assert_eq!(config.ratelimit.rules.len(), 1);
        assert_eq!(config.propagation.queue_capacity, 512);
        assert!(config.auth.enabled);
    }

    #[test]
    fn invalid_ratelimit_rule_rejected() {
        let yaml = r"
agent:
  name: steward-1
ratelimit:
  rules:
    - id: ''
      limit: 100
      window_secs: 60
";
        assert!(StewardConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn short_jwt_secret_rejected() {
        let yaml = "agent:\n  name: x\nauth:\n  enabled: true\n  jwt_secret: short\n";
        assert!(StewardConfig::from_yaml(yaml).is_err());
    }
}
