use std::collections::BTreeMap;

use crate::common::error::DomainError;

use super::entity::{Decision, EvalContext, Evaluation, Policy, PolicyId, PolicyRule, TraceStep};
use super::error::PolicyError;

/// In-memory policy registry and evaluator.
///
/// Every version of every policy is retained so that evaluation can pin
/// an exact snapshot. Writes use optimistic concurrency on the policy
/// version (0 creates, current updates); evaluation is read-only and a
/// pure function of the pinned snapshot and the supplied context.
#[derive(Debug, Default)]
pub struct PolicyEngine {
    /// Versions per policy, ascending.
    policies: BTreeMap<PolicyId, Vec<Policy>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new version of a policy. `expected_version` must be 0 for a
    /// create and the current version for an update. Returns the new
    /// version.
    pub fn put_policy(
        &mut self,
        id: PolicyId,
        rules: Vec<PolicyRule>,
        expected_version: u64,
        now_ms: u64,
    ) -> Result<u64, DomainError> {
        id.validate()?;

        let current_version = self
            .policies
            .get(&id)
            .and_then(|versions| versions.last())
            .map_or(0, |p| p.version);
        if expected_version != current_version {
            return Err(PolicyError::VersionConflict {
                id: id.0.clone(),
                expected: expected_version,
                current: current_version,
            }
            .into());
        }

        let policy = Policy {
            id: id.clone(),
            version: current_version + 1,
            rules,
            created_at_ms: now_ms,
        };
        policy.validate()?;

        let new_version = policy.version;
        self.policies.entry(id).or_default().push(policy);
        Ok(new_version)
    }

    /// The latest version of a policy.
    pub fn get(&self, id: &PolicyId) -> Result<&Policy, DomainError> {
        self.policies
            .get(id)
            .and_then(|versions| versions.last())
            .ok_or_else(|| PolicyError::PolicyNotFound { id: id.0.clone() }.into())
    }

    /// A pinned version of a policy.
    pub fn get_version(&self, id: &PolicyId, version: u64) -> Result<&Policy, DomainError> {
        let versions = self
            .policies
            .get(id)
            .ok_or_else(|| PolicyError::PolicyNotFound { id: id.0.clone() })?;
        versions
            .iter()
            .find(|p| p.version == version)
            .ok_or_else(|| {
                PolicyError::SnapshotUnavailable {
                    id: id.0.clone(),
                    version,
                }
                .into()
            })
    }

    /// Evaluate a policy against a context.
    ///
    /// Pins `version` (or the latest when `None`), then walks rules in
    /// descending priority. Within one priority band Deny rules are
    /// inspected before Allow rules, so an explicit Deny always overrides
    /// an Allow of equal priority. The first matching rule decides; no
    /// match fails closed to Deny.
    pub fn evaluate(
        &self,
        id: &PolicyId,
        version: Option<u64>,
        context: &EvalContext,
    ) -> Result<Evaluation, DomainError> {
        let policy = match version {
            Some(v) => self.get_version(id, v)?,
            None => self.get(id)?,
        };

        let mut ordered: Vec<&PolicyRule> = policy.rules.iter().collect();
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| deny_rank(a).cmp(&deny_rank(b)))
                .then_with(|| a.id.0.cmp(&b.id.0))
        });

        let mut trace = Vec::with_capacity(ordered.len());
        for rule in ordered {
            let matched = rule.predicate.matches(context);
            trace.push(TraceStep {
                rule_id: rule.id.0.clone(),
                matched,
            });
            if matched {
                return Ok(Evaluation {
                    decision: rule.effect.into(),
                    matched_rule_id: Some(rule.id.0.clone()),
                    policy_version: policy.version,
                    trace,
                });
            }
        }

        // No rule matched: fail closed.
        Ok(Evaluation {
            decision: Decision::Deny,
            matched_rule_id: None,
            policy_version: policy.version,
            trace,
        })
    }

    /// Latest versions of all policies.
    pub fn policies(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values().filter_map(|versions| versions.last())
    }

    /// Every retained version of every policy (for persistence).
    pub fn all_versions(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values().flatten()
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Hydrate from persisted state. Versions per policy must be dense
    /// and start at 1.
    pub fn load(&mut self, versions: Vec<Policy>) -> Result<(), DomainError> {
        let mut map: BTreeMap<PolicyId, Vec<Policy>> = BTreeMap::new();
        for policy in versions {
            policy.validate()?;
            map.entry(policy.id.clone()).or_default().push(policy);
        }
        for (id, versions) in &mut map {
            versions.sort_by_key(|p| p.version);
            for (i, policy) in versions.iter().enumerate() {
                if policy.version != i as u64 + 1 {
                    return Err(DomainError::StoreFailed(format!(
                        "policy '{id}': version chain has a gap at v{}",
                        policy.version
                    )));
                }
            }
        }
        self.policies = map;
        Ok(())
    }
}

/// Deny sorts before Allow inside a priority band.
fn deny_rank(rule: &PolicyRule) -> u8 {
    match rule.effect {
        super::entity::Effect::Deny => 0,
        super::entity::Effect::Allow => 1,
    }
}
