use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::entity::RuleId;

use super::error::PolicyError;

/// Maximum nesting depth for composite predicates.
pub const MAX_PREDICATE_DEPTH: usize = 16;

/// Identifier of a policy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub String);

impl PolicyId {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.0.is_empty() {
            return Err(PolicyError::InvalidPolicy(
                "policy id must not be empty".to_string(),
            ));
        }
        if self.0.len() > 128 {
            return Err(PolicyError::InvalidPolicy(
                "policy id exceeds 128 characters".to_string(),
            ));
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(PolicyError::InvalidPolicy(format!(
                "policy id '{}' contains invalid characters",
                self.0
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The effect a matching rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

/// The final decision of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl From<Effect> for Decision {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Allow => Self::Allow,
            Effect::Deny => Self::Deny,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule predicate: a closed set of structurally-matched variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Context attribute equals a value exactly.
    AttributeEquals { key: String, value: String },
    /// Context attribute is one of a set of values.
    AttributeInSet { key: String, values: Vec<String> },
    /// The evaluation minute-of-day (UTC) falls inside the window.
    /// `start_minute <= m < end_minute`; windows may wrap midnight.
    TimeWindow { start_minute: u16, end_minute: u16 },
    /// All sub-predicates match.
    All { predicates: Vec<Predicate> },
    /// At least one sub-predicate matches.
    Any { predicates: Vec<Predicate> },
}

impl Predicate {
    /// Structural match against the context. Pure; no I/O.
    pub fn matches(&self, context: &EvalContext) -> bool {
        match self {
            Self::AttributeEquals { key, value } => {
                context.attributes.get(key).is_some_and(|v| v == value)
            }
            Self::AttributeInSet { key, values } => context
                .attributes
                .get(key)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
            Self::TimeWindow {
                start_minute,
                end_minute,
            } => {
                let m = context.minute_of_day;
                if start_minute <= end_minute {
                    *start_minute <= m && m < *end_minute
                } else {
                    // Wraps midnight, e.g. 22:00–06:00.
                    m >= *start_minute || m < *end_minute
                }
            }
            Self::All { predicates } => predicates.iter().all(|p| p.matches(context)),
            Self::Any { predicates } => predicates.iter().any(|p| p.matches(context)),
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        self.validate_at_depth(0)
    }

    fn validate_at_depth(&self, depth: usize) -> Result<(), PolicyError> {
        if depth > MAX_PREDICATE_DEPTH {
            return Err(PolicyError::InvalidPolicy(format!(
                "predicate nesting exceeds depth {MAX_PREDICATE_DEPTH}"
            )));
        }
        match self {
            Self::AttributeEquals { key, .. } => {
                if key.is_empty() {
                    return Err(PolicyError::InvalidPolicy(
                        "attribute key must not be empty".to_string(),
                    ));
                }
            }
            Self::AttributeInSet { key, values } => {
                if key.is_empty() {
                    return Err(PolicyError::InvalidPolicy(
                        "attribute key must not be empty".to_string(),
                    ));
                }
                if values.is_empty() {
                    return Err(PolicyError::InvalidPolicy(
                        "attribute set must not be empty".to_string(),
                    ));
                }
            }
            Self::TimeWindow {
                start_minute,
                end_minute,
            } => {
                if *start_minute >= 1440 || *end_minute >= 1440 {
                    return Err(PolicyError::InvalidPolicy(
                        "time window minutes must be < 1440".to_string(),
                    ));
                }
            }
            Self::All { predicates } | Self::Any { predicates } => {
                if predicates.is_empty() {
                    return Err(PolicyError::InvalidPolicy(
                        "composite predicate must not be empty".to_string(),
                    ));
                }
                for child in predicates {
                    child.validate_at_depth(depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

/// One rule inside a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: RuleId,
    /// Higher priorities are evaluated first.
    pub priority: u32,
    pub effect: Effect,
    pub predicate: Predicate,
}

impl PolicyRule {
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.id
            .validate()
            .map_err(|reason| PolicyError::InvalidPolicy(reason.to_string()))?;
        self.predicate.validate()
    }
}

/// A versioned policy: the rule list mutates only as a whole unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub version: u64,
    pub rules: Vec<PolicyRule>,
    pub created_at_ms: u64,
}

impl Policy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.id.validate()?;
        for rule in &self.rules {
            rule.validate()?;
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if self.rules[i + 1..].iter().any(|r| r.id == rule.id) {
                return Err(PolicyError::DuplicateRuleId {
                    id: rule.id.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// The attributes evaluation runs against. Pure input; no hidden state.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub attributes: BTreeMap<String, String>,
    /// Minutes since UTC midnight, for `TimeWindow` predicates.
    pub minute_of_day: u16,
}

/// One step in the evaluation trace: rule inspected, match outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub rule_id: String,
    pub matched: bool,
}

/// The full result of an evaluation, including the audit trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub matched_rule_id: Option<String>,
    pub policy_version: u64,
    pub trace: Vec<TraceStep>,
}
