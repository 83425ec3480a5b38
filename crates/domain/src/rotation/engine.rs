use std::collections::BTreeMap;

use crate::common::error::DomainError;

use super::entity::RotationPolicy;
use super::error::RotationError;

/// In-memory rotation policy registry.
///
/// Policies are keyed by secret name (one active policy per secret) and
/// iterate in name order for deterministic scheduling.
#[derive(Debug, Default)]
pub struct RotationEngine {
    policies: BTreeMap<String, RotationPolicy>,
}

impl RotationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy. Validates and rejects duplicates.
    pub fn add_policy(&mut self, policy: RotationPolicy) -> Result<(), DomainError> {
        policy.validate()?;
        if self.policies.contains_key(&policy.secret_name) {
            return Err(RotationError::DuplicatePolicy {
                name: policy.secret_name.clone(),
            }
            .into());
        }
        self.policies.insert(policy.secret_name.clone(), policy);
        Ok(())
    }

    /// Remove the policy for a secret.
    pub fn remove_policy(&mut self, secret_name: &str) -> Result<(), DomainError> {
        self.policies
            .remove(secret_name)
            .map(|_| ())
            .ok_or_else(|| {
                RotationError::PolicyNotFound {
                    name: secret_name.to_string(),
                }
                .into()
            })
    }

    /// Replace the schedule for an existing secret (administrative update).
    pub fn update_policy(&mut self, policy: RotationPolicy) -> Result<(), DomainError> {
        policy.validate()?;
        if !self.policies.contains_key(&policy.secret_name) {
            return Err(RotationError::PolicyNotFound {
                name: policy.secret_name.clone(),
            }
            .into());
        }
        self.policies.insert(policy.secret_name.clone(), policy);
        Ok(())
    }

    pub fn get(&self, secret_name: &str) -> Result<&RotationPolicy, DomainError> {
        self.policies.get(secret_name).ok_or_else(|| {
            RotationError::PolicyNotFound {
                name: secret_name.to_string(),
            }
            .into()
        })
    }

    /// Names of all policies due at `now_ms`, in deterministic order.
    pub fn due_policies(&self, now_ms: u64) -> Vec<&RotationPolicy> {
        self.policies.values().filter(|p| p.is_due(now_ms)).collect()
    }

    /// Record a completed rotation: stamp `last_rotated_at_ms` and advance
    /// `next_rotation_at_ms` by one interval from now.
    pub fn mark_rotated(&mut self, secret_name: &str, now_ms: u64) -> Result<(), DomainError> {
        let policy = self
            .policies
            .get_mut(secret_name)
            .ok_or_else(|| RotationError::PolicyNotFound {
                name: secret_name.to_string(),
            })?;
        policy.last_rotated_at_ms = Some(now_ms);
        policy.next_rotation_at_ms = now_ms + policy.interval_secs * 1000;
        Ok(())
    }

    pub fn policies(&self) -> impl Iterator<Item = &RotationPolicy> {
        self.policies.values()
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Hydrate from persisted state. Validates every policy.
    pub fn load(&mut self, policies: Vec<RotationPolicy>) -> Result<(), DomainError> {
        let mut map = BTreeMap::new();
        for policy in policies {
            policy.validate()?;
            if map.insert(policy.secret_name.clone(), policy).is_some() {
                return Err(DomainError::StoreFailed(
                    "duplicate rotation policy in snapshot".to_string(),
                ));
            }
        }
        self.policies = map;
        Ok(())
    }
}
