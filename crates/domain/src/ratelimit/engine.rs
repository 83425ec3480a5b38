use crate::common::entity::RuleId;
use crate::common::error::DomainError;

use super::entity::RateLimitRule;
use super::error::RateLimitError;

/// In-memory rate limit rule registry.
///
/// Rules are stored sorted by ID for deterministic iteration. CRUD
/// operations validate rules and reject duplicates. Counter state lives
/// elsewhere (the shared counter store); this engine only owns rule
/// definitions.
#[derive(Debug, Default)]
pub struct RateLimitEngine {
    rules: Vec<RateLimitRule>,
}

impl RateLimitEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. Validates the rule and rejects duplicates.
    pub fn add_rule(&mut self, rule: RateLimitRule) -> Result<(), DomainError> {
        rule.validate()?;

        if self.rules.iter().any(|r| r.id == rule.id) {
            return Err(RateLimitError::DuplicateRule {
                id: rule.id.to_string(),
            }
            .into());
        }

        self.rules.push(rule);
        self.sort_rules();
        Ok(())
    }

    /// Remove a rule by ID.
    pub fn remove_rule(&mut self, id: &RuleId) -> Result<(), DomainError> {
        let pos = self
            .rules
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| RateLimitError::RuleNotFound { id: id.to_string() })?;
        self.rules.remove(pos);
        Ok(())
    }

    /// Look up an enabled rule by ID for an admission check.
    pub fn rule(&self, id: &RuleId) -> Result<&RateLimitRule, DomainError> {
        self.rules
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| RateLimitError::RuleNotFound { id: id.to_string() }.into())
    }

    /// Replace all rules atomically. Validates all rules before replacing.
    pub fn reload(&mut self, rules: Vec<RateLimitRule>) -> Result<(), DomainError> {
        for rule in &rules {
            rule.validate()?;
        }

        for (i, rule) in rules.iter().enumerate() {
            if rules[i + 1..].iter().any(|r| r.id == rule.id) {
                return Err(RateLimitError::DuplicateRule {
                    id: rule.id.to_string(),
                }
                .into());
            }
        }

        self.rules = rules;
        self.sort_rules();
        Ok(())
    }

    /// Return a slice of all loaded rules (sorted by ID).
    pub fn rules(&self) -> &[RateLimitRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn sort_rules(&mut self) {
        self.rules.sort_by(|a, b| a.id.0.cmp(&b.id.0));
    }
}
