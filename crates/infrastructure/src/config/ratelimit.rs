//! Rate limiting configuration structs and conversion logic.

use domain::common::entity::RuleId;
use domain::ratelimit::entity::{RateLimitAlgorithm, RateLimitRule, RateLimitScope};
use serde::{Deserialize, Serialize};

use super::common::{ConfigError, default_true};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Rules seeded at startup; more can be added via the API.
    #[serde(default)]
    pub rules: Vec<RateLimitRuleConfig>,
}

impl Default for RateLimitSectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRuleConfig {
    pub id: String,

    /// Scope: `global`, `user`, `ip`, or `endpoint`.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Algorithm: `token_bucket`, `fixed_window`, `sliding_window`,
    /// `leaky_bucket`.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Requests per window.
    pub limit: u64,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Token bucket capacity. Defaults to `limit` when omitted.
    #[serde(default)]
    pub burst_capacity: Option<u64>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_scope() -> String {
    "user".to_string()
}

fn default_algorithm() -> String {
    "token_bucket".to_string()
}

impl RateLimitRuleConfig {
    pub(super) fn validate(&self, idx: usize) -> Result<(), ConfigError> {
        let prefix = format!("ratelimit.rules[{idx}]");

        if self.id.is_empty() {
            return Err(ConfigError::Validation {
                field: format!("{prefix}.id"),
                message: "rule ID must not be empty".to_string(),
            });
        }
        if RateLimitScope::parse_name(&self.scope).is_none() {
            return Err(ConfigError::InvalidValue {
                field: format!("{prefix}.scope"),
                value: self.scope.clone(),
                expected: "global, user, ip, endpoint".to_string(),
            });
        }
        if RateLimitAlgorithm::parse_name(&self.algorithm).is_none() {
            return Err(ConfigError::InvalidValue {
                field: format!("{prefix}.algorithm"),
                value: self.algorithm.clone(),
                expected: "token_bucket, fixed_window, sliding_window, leaky_bucket".to_string(),
            });
        }
        if self.limit == 0 {
            return Err(ConfigError::Validation {
                field: format!("{prefix}.limit"),
                message: "limit must be > 0".to_string(),
            });
        }
        if self.window_secs == 0 {
            return Err(ConfigError::Validation {
                field: format!("{prefix}.window_secs"),
                message: "window_secs must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Convert to the domain rule. `validate` must have passed.
    pub fn to_domain(&self) -> RateLimitRule {
        RateLimitRule {
            id: RuleId(self.id.clone()),
            scope: RateLimitScope::parse_name(&self.scope).unwrap_or(RateLimitScope::User),
            algorithm: RateLimitAlgorithm::parse_name(&self.algorithm).unwrap_or_default(),
            limit: self.limit,
            window_secs: self.window_secs,
            burst_capacity: self.burst_capacity.unwrap_or(self.limit),
            enabled: self.enabled,
        }
    }
}
