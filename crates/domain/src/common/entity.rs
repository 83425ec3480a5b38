use serde::{Deserialize, Serialize};

/// Identifier for a rate-limit rule, policy rule, or rotation policy.
///
/// Non-empty, at most 128 characters, restricted to `[A-Za-z0-9._:-]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.0.is_empty() {
            return Err("id must not be empty");
        }
        if self.0.len() > 128 {
            return Err("id must be at most 128 characters");
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'))
        {
            return Err("id contains invalid characters");
        }
        Ok(())
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deployment environment a config entry belongs to.
///
/// `global` is the reserved fallback environment: lookups for any other
/// environment fall back to the `global` entry when no override exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Environment(pub String);

pub const GLOBAL_ENVIRONMENT: &str = "global";

impl Environment {
    pub fn global() -> Self {
        Self(GLOBAL_ENVIRONMENT.to_string())
    }

    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_ENVIRONMENT
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.0.is_empty() {
            return Err("environment must not be empty");
        }
        if self.0.len() > 64 {
            return Err("environment must be at most 64 characters");
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err("environment must be lowercase alphanumeric or '-'");
        }
        Ok(())
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of entity a change stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Config,
    Secret,
    Policy,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Secret => "secret",
            Self::Policy => "policy",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "config" => Some(Self::Config),
            "secret" => Some(Self::Secret),
            "policy" => Some(Self::Policy),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_id_valid() {
        assert!(RuleId("rl-001".to_string()).validate().is_ok());
        assert!(RuleId("a.b_c:d-e".to_string()).validate().is_ok());
    }

    #[test]
    fn rule_id_empty() {
        assert!(RuleId(String::new()).validate().is_err());
    }

    #[test]
    fn rule_id_too_long() {
        assert!(RuleId("x".repeat(129)).validate().is_err());
    }

    #[test]
    fn rule_id_invalid_chars() {
        assert!(RuleId("bad id".to_string()).validate().is_err());
        assert!(RuleId("bad/id".to_string()).validate().is_err());
    }

    #[test]
    fn environment_valid() {
        assert!(Environment("prod".to_string()).validate().is_ok());
        assert!(Environment("eu-west-1".to_string()).validate().is_ok());
    }

    #[test]
    fn environment_rejects_uppercase() {
        assert!(Environment("Prod".to_string()).validate().is_err());
    }

    #[test]
    fn environment_rejects_empty() {
        assert!(Environment(String::new()).validate().is_err());
    }

    #[test]
    fn global_environment() {
        assert!(Environment::global().is_global());
        assert!(!Environment("prod".to_string()).is_global());
    }

    #[test]
    fn entity_kind_round_trip() {
        for kind in [EntityKind::Config, EntityKind::Secret, EntityKind::Policy] {
            assert_eq!(EntityKind::parse_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse_name("unknown"), None);
    }
}
