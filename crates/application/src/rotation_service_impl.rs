use std::collections::HashMap;
use std::sync::Arc;

use domain::common::error::DomainError;
use domain::rotation::engine::RotationEngine;
use domain::rotation::entity::{RotationPolicy, RotationRun, RotationState};
use ports::secondary::lease_store::LeaseStore;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::secret_store::SecretStore;
use tokio::sync::RwLock;

use crate::clock::now_ms;
use crate::secrets_service_impl::SecretsAppService;

/// Lease TTL granted per rotation attempt. Long enough to cover a slow
/// vault write, short enough that a crashed holder frees the policy
/// quickly.
const ROTATION_LEASE_TTL_MS: u64 = 60_000;

/// Application-level rotation scheduler service.
///
/// Owns the rotation policy registry and the per-secret run states the
/// scheduler loop reports. The loop itself lives in the agent; the
/// orchestration of one tick is `run_rotation_cycle` below.
pub struct RotationAppService {
    engine: RotationEngine,
    store: Option<Arc<dyn SecretStore>>,
    metrics: Arc<dyn MetricsPort>,
    /// Last observed run per secret, for the status API.
    runs: HashMap<String, RotationRun>,
}

impl RotationAppService {
    pub fn new(engine: RotationEngine, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            engine,
            store: None,
            metrics,
            runs: HashMap::new(),
        }
    }

    /// Attach policy persistence.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Hydrate policies from the attached store.
    pub fn hydrate(&mut self) -> Result<(), DomainError> {
        if let Some(store) = &self.store {
            self.engine.load(store.load_policies()?)?;
        }
        Ok(())
    }

    /// Add a policy. A fresh policy's first rotation is one interval out.
    pub fn add_policy(&mut self, mut policy: RotationPolicy) -> Result<(), DomainError> {
        if policy.next_rotation_at_ms == 0 {
            policy.next_rotation_at_ms = now_ms() + policy.interval_secs * 1000;
        }
        self.engine.add_policy(policy.clone())?;
        self.persist(&policy);
        self.update_metrics();
        Ok(())
    }

    /// Administrative schedule change.
    pub fn update_policy(&mut self, policy: RotationPolicy) -> Result<(), DomainError> {
        self.engine.update_policy(policy.clone())?;
        self.persist(&policy);
        Ok(())
    }

    pub fn remove_policy(&mut self, secret_name: &str) -> Result<(), DomainError> {
        self.engine.remove_policy(secret_name)?;
        self.runs.remove(secret_name);
        if let Some(store) = &self.store {
            if let Err(e) = store.remove_policy(secret_name) {
                tracing::error!(secret = secret_name, error = %e, "failed to remove persisted policy");
            }
        }
        self.update_metrics();
        Ok(())
    }

    pub fn get(&self, secret_name: &str) -> Result<&RotationPolicy, DomainError> {
        self.engine.get(secret_name)
    }

    pub fn policies(&self) -> impl Iterator<Item = &RotationPolicy> {
        self.engine.policies()
    }

    pub fn policy_count(&self) -> usize {
        self.engine.policy_count()
    }

    /// Policies due at `now_ms`, cloned for lock-free processing.
    pub fn due_policies(&self, now_ms: u64) -> Vec<RotationPolicy> {
        self.engine.due_policies(now_ms).into_iter().cloned().collect()
    }

    /// Record a completed rotation and advance the schedule.
    pub fn mark_rotated(&mut self, secret_name: &str, now_ms: u64) -> Result<(), DomainError> {
        self.engine.mark_rotated(secret_name, now_ms)?;
        if let Ok(policy) = self.engine.get(secret_name) {
            let policy = policy.clone();
            self.persist(&policy);
        }
        Ok(())
    }

    /// Track a run's state for the status API.
    pub fn set_run(&mut self, run: RotationRun) {
        self.runs.insert(run.secret_name.clone(), run);
    }

    pub fn run_state(&self, secret_name: &str) -> Option<&RotationRun> {
        self.runs.get(secret_name)
    }

    fn update_metrics(&self) {
        self.metrics
            .set_rules_loaded("rotation", self.engine.policy_count() as u64);
    }

    fn persist(&self, policy: &RotationPolicy) {
        if let Some(store) = &self.store {
            if let Err(e) = store.persist_policy(policy) {
                tracing::error!(
                    secret = %policy.secret_name,
                    error = %e,
                    "rotation policy write-through persistence failed"
                );
            }
        }
    }
}

/// One scheduler tick: rotate every due policy under its lease, then
/// sweep expired grace windows.
///
/// Each policy is handled independently; a failed rotation is logged and
/// retried on the next tick. The lease guarantees a single active
/// rotation per policy across scheduler instances. Callers drive this
/// from a loop that completes the in-flight cycle before honoring
/// shutdown, so every rotated secret leaves with a registered expiry.
pub async fn run_rotation_cycle(
    secrets: &RwLock<SecretsAppService>,
    rotation: &RwLock<RotationAppService>,
    lease_store: &dyn LeaseStore,
    holder: &str,
) -> usize {
    let now = now_ms();
    let due = rotation.read().await.due_policies(now);
    let mut rotated = 0usize;

    for policy in due {
        let lease_name = format!("rotation/{}", policy.secret_name);
        match lease_store.try_acquire(&lease_name, holder, ROTATION_LEASE_TTL_MS, now) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(secret = %policy.secret_name, "rotation lease held elsewhere, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(secret = %policy.secret_name, error = %e, "lease acquisition failed");
                continue;
            }
        }

        let mut run = RotationRun::new(policy.secret_name.clone(), now);
        run.advance(); // Scheduled → Rotating
        rotation.write().await.set_run(run.clone());

        let name = domain::secrets::entity::SecretName(policy.secret_name.clone());
        let result = secrets
            .write()
            .await
            .rotate(&name, None, policy.grace_period_ms());

        match result {
            Ok(version) => {
                run.advance(); // Rotating → GracePeriod
                let mut rotation_guard = rotation.write().await;
                rotation_guard.set_run(run.clone());
                if let Err(e) = rotation_guard.mark_rotated(&policy.secret_name, now_ms()) {
                    tracing::warn!(secret = %policy.secret_name, error = %e, "failed to advance schedule");
                }
                drop(rotation_guard);
                tracing::info!(
                    secret = %policy.secret_name,
                    version,
                    grace_secs = policy.grace_period_secs,
                    "secret rotated"
                );
                rotated += 1;
            }
            Err(e) => {
                tracing::warn!(secret = %policy.secret_name, error = %e, "rotation failed, will retry next tick");
            }
        }

        if let Err(e) = lease_store.release(&lease_name, holder) {
            tracing::warn!(secret = %policy.secret_name, error = %e, "lease release failed");
        }
    }

    // Sweep grace windows independently of whether anything rotated.
    let revoked = secrets.write().await.expire_deprecated();
    if revoked > 0 {
        let mut rotation_guard = rotation.write().await;
        let completed: Vec<String> = rotation_guard
            .runs
            .iter()
            .filter(|(_, run)| run.state == RotationState::GracePeriod)
            .map(|(name, _)| name.clone())
            .collect();
        for name in completed {
            if let Some(run) = rotation_guard.runs.get_mut(&name) {
                run.advance(); // GracePeriod → Completed
            }
        }
    }

    rotated
}
