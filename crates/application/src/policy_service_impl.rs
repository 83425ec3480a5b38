use std::sync::Arc;

use domain::common::entity::EntityKind;
use domain::common::error::DomainError;
use domain::policy::engine::PolicyEngine;
use domain::policy::entity::{
    Decision, EvalContext, Evaluation, Policy, PolicyId, PolicyRule,
};
use domain::propagation::entity::ChangeEvent;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::policy_store::PolicyStore;

use crate::clock::now_ms;
use crate::propagator::ChangePropagator;

/// Application-level policy service.
///
/// Orchestrates the versioned policy engine, persistence, change
/// propagation, and metrics. Evaluation is read-only; a corrupt or
/// missing snapshot resolves to Deny rather than surfacing an error to
/// the caller's request path.
pub struct PolicyAppService {
    engine: PolicyEngine,
    store: Option<Arc<dyn PolicyStore>>,
    propagator: Option<ChangePropagator>,
    metrics: Arc<dyn MetricsPort>,
}

impl PolicyAppService {
    pub fn new(engine: PolicyEngine, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            engine,
            store: None,
            propagator: None,
            metrics,
        }
    }

    /// Attach write-through persistence.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PolicyStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach the change propagator.
    #[must_use]
    pub fn with_propagator(mut self, propagator: ChangePropagator) -> Self {
        self.propagator = Some(propagator);
        self
    }

    /// Hydrate the engine from the attached store.
    pub fn hydrate(&mut self) -> Result<(), DomainError> {
        if let Some(store) = &self.store {
            self.engine.load(store.load_all()?)?;
        }
        self.metrics.set_policies_loaded(self.engine.policy_count() as u64);
        Ok(())
    }

    /// Store a new policy version under optimistic concurrency. Returns
    /// the new version.
    pub fn put_policy(
        &mut self,
        id: PolicyId,
        rules: Vec<PolicyRule>,
        expected_version: u64,
    ) -> Result<u64, DomainError> {
        let version = self
            .engine
            .put_policy(id.clone(), rules, expected_version, now_ms())
            .inspect_err(|e| {
                if matches!(e, DomainError::VersionConflict { .. }) {
                    self.metrics.record_version_conflict("policy");
                }
            })?;

        self.metrics.set_policies_loaded(self.engine.policy_count() as u64);

        if let Some(store) = &self.store {
            if let Ok(policy) = self.engine.get_version(&id, version) {
                if let Err(e) = store.persist_version(policy) {
                    tracing::error!(policy = %id, version, error = %e, "policy write-through persistence failed");
                }
            }
        }

        if let Some(propagator) = &self.propagator {
            propagator.publish(ChangeEvent {
                kind: EntityKind::Policy,
                key: id.0.clone(),
                version,
                payload: String::new(),
                occurred_at_ms: now_ms(),
            });
        }

        Ok(version)
    }

    /// Evaluate a policy against a context.
    ///
    /// A missing policy surfaces as NotFound (the caller asked about
    /// something that does not exist); a missing pinned snapshot fails
    /// closed to Deny with an empty trace, per the control plane's
    /// fail-closed contract.
    pub fn evaluate(
        &self,
        id: &PolicyId,
        version: Option<u64>,
        context: &EvalContext,
    ) -> Result<Evaluation, DomainError> {
        let result = match self.engine.evaluate(id, version, context) {
            Ok(result) => result,
            Err(DomainError::EvaluationFailed(reason)) => {
                tracing::warn!(policy = %id, reason, "evaluation failed, denying");
                Evaluation {
                    decision: Decision::Deny,
                    matched_rule_id: None,
                    policy_version: version.unwrap_or(0),
                    trace: Vec::new(),
                }
            }
            Err(e) => return Err(e),
        };

        self.metrics.record_evaluation(result.decision.as_str());
        Ok(result)
    }

    pub fn get(&self, id: &PolicyId) -> Result<&Policy, DomainError> {
        self.engine.get(id)
    }

    pub fn get_version(&self, id: &PolicyId, version: u64) -> Result<&Policy, DomainError> {
        self.engine.get_version(id, version)
    }

    pub fn policies(&self) -> impl Iterator<Item = &Policy> {
        self.engine.policies()
    }

    pub fn policy_count(&self) -> usize {
        self.engine.policy_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::common::entity::RuleId;
    use domain::policy::entity::{Effect, Predicate};
    use ports::test_utils::{InMemoryPolicyStore, NoopMetrics};

    fn make_service() -> PolicyAppService {
        PolicyAppService::new(PolicyEngine::new(), Arc::new(NoopMetrics))
    }

    fn pid(s: &str) -> PolicyId {
        PolicyId(s.to_string())
    }

    fn rule(id: &str, priority: u32, effect: Effect) -> PolicyRule {
        PolicyRule {
            id: RuleId(id.to_string()),
            priority,
            effect,
            predicate: Predicate::AttributeEquals {
                key: "role".to_string(),
                value: "admin".to_string(),
            },
        }
    }

    fn admin_context() -> EvalContext {
        EvalContext {
            attributes: [("role".to_string(), "admin".to_string())].into_iter().collect(),
            minute_of_day: 0,
        }
    }

    #[test]
    fn put_and_evaluate() {
        let mut svc = make_service();
        svc.put_policy(pid("p1"), vec![rule("r1", 10, Effect::Allow)], 0)
            .unwrap();

        let result = svc.evaluate(&pid("p1"), None, &admin_context()).unwrap();
        assert_eq!(result.decision, Decision::Allow);
        assert_eq!(result.matched_rule_id.as_deref(), Some("r1"));
    }

    #[test]
    fn missing_snapshot_resolves_to_deny() {
        let mut svc = make_service();
        svc.put_policy(pid("p1"), vec![rule("r1", 10, Effect::Allow)], 0)
            .unwrap();

        let result = svc.evaluate(&pid("p1"), Some(9), &admin_context()).unwrap();
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.matched_rule_id.is_none());
        assert!(result.trace.is_empty());
    }

    #[test]
    fn missing_policy_is_not_found() {
        let svc = make_service();
        assert!(matches!(
            svc.evaluate(&pid("nope"), None, &admin_context()).unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[test]
    fn versions_persist_through_store() {
        let store = Arc::new(InMemoryPolicyStore::new());
        let mut svc = make_service().with_store(Arc::clone(&store) as Arc<dyn PolicyStore>);
        svc.put_policy(pid("p1"), vec![rule("r1", 10, Effect::Allow)], 0)
            .unwrap();
        svc.put_policy(pid("p1"), vec![rule("r1", 10, Effect::Deny)], 1)
            .unwrap();

        let mut restored = make_service().with_store(Arc::clone(&store) as Arc<dyn PolicyStore>);
        restored.hydrate().unwrap();
        assert_eq!(restored.get(&pid("p1")).unwrap().version, 2);
        // The pinned old snapshot still evaluates.
        let result = restored.evaluate(&pid("p1"), Some(1), &admin_context()).unwrap();
        assert_eq!(result.decision, Decision::Allow);
    }

    #[tokio::test]
    async fn put_policy_publishes_change_event() {
        use tokio_util::sync::CancellationToken;

        let propagator = ChangePropagator::new(
            crate::propagator::PropagatorConfig::default(),
            Arc::new(NoopMetrics),
            CancellationToken::new(),
        );
        let mut rx = propagator.subscribe(EntityKind::Policy, "p1", 0).await;

        let mut svc = make_service().with_propagator(propagator);
        svc.put_policy(pid("p1"), vec![rule("r1", 10, Effect::Allow)], 0)
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EntityKind::Policy);
        assert_eq!(event.version, 1);
    }

    #[test]
    fn stale_put_conflicts() {
        let mut svc = make_service();
        svc.put_policy(pid("p1"), vec![rule("r1", 10, Effect::Allow)], 0)
            .unwrap();
        assert!(matches!(
            svc.put_policy(pid("p1"), vec![rule("r1", 10, Effect::Deny)], 0)
                .unwrap_err(),
            DomainError::VersionConflict { .. }
        ));
    }
}
