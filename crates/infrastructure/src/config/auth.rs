//! API authentication configuration.

use serde::{Deserialize, Serialize};

use super::common::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,

    /// HS256 signing secret for API tokens. Required when enabled.
    #[serde(default)]
    pub jwt_secret: String,

    /// Expected `iss` claim, when set.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Whether `/metrics` also requires authentication.
    #[serde(default)]
    pub metrics_auth_required: bool,
}

impl AuthConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.jwt_secret.len() < 32 {
            return Err(ConfigError::Validation {
                field: "auth.jwt_secret".to_string(),
                message: "must be at least 32 bytes when auth is enabled".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        let cfg = AuthConfig::default();
        assert!(!cfg.enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn enabled_requires_long_secret() {
        let cfg = AuthConfig {
            enabled: true,
            jwt_secret: "short".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn enabled_with_long_secret_ok() {
        let cfg = AuthConfig {
            enabled: true,
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }
}
