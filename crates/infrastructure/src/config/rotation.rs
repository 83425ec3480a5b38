//! Rotation scheduler configuration.

use domain::rotation::entity::RotationPolicy;
use serde::{Deserialize, Serialize};

use super::common::{ConfigError, default_true};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scheduler tick interval.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Policies seeded at startup; more can be added via the API.
    #[serde(default)]
    pub policies: Vec<RotationPolicyConfig>,
}

fn default_tick_secs() -> u64 {
    30
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: default_tick_secs(),
            policies: Vec::new(),
        }
    }
}

impl RotationConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_secs == 0 {
            return Err(ConfigError::Validation {
                field: "rotation.tick_secs".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        for (idx, policy) in self.policies.iter().enumerate() {
            policy.validate(idx)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationPolicyConfig {
    pub secret_name: String,
    pub interval_secs: u64,
    #[serde(default)]
    pub grace_period_secs: u64,
}

impl RotationPolicyConfig {
    pub(super) fn validate(&self, idx: usize) -> Result<(), ConfigError> {
        // Reuse the domain validation for interval/grace invariants.
        self.to_domain().validate().map_err(|e| ConfigError::Validation {
            field: format!("rotation.policies[{idx}]"),
            message: e.to_string(),
        })
    }

    /// Convert to the domain policy. The first rotation is scheduled by
    /// the rotation service when the policy is registered.
    pub fn to_domain(&self) -> RotationPolicy {
        RotationPolicy {
            secret_name: self.secret_name.clone(),
            interval_secs: self.interval_secs,
            grace_period_secs: self.grace_period_secs,
            last_rotated_at_ms: None,
            next_rotation_at_ms: 0,
        }
    }
}
