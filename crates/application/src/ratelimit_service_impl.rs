use std::sync::Arc;

use domain::common::entity::RuleId;
use domain::common::error::DomainError;
use domain::ratelimit::bucket::{
    drain_queue, pack_state, refill_tokens, secs_until_next_token, secs_until_window_end,
    sliding_window_count, window_start_ms,
};
use domain::ratelimit::engine::RateLimitEngine;
use domain::ratelimit::entity::{
    RateLimitAlgorithm, RateLimitDecision, RateLimitRule,
};
use ports::secondary::counter_store::CounterStore;
use ports::secondary::metrics_port::MetricsPort;

use crate::clock::now_ms;

/// Upper bound on compare-and-swap retries for the stateful algorithms.
/// Contention beyond this indicates a misbehaving store.
const MAX_CAS_ATTEMPTS: usize = 16;

/// Application-level rate limit service.
///
/// Owns the rule registry and makes admission decisions against the
/// shared atomic counter store. Decisions are O(1): one atomic increment
/// for the window algorithms, a short CAS loop for the bucket
/// algorithms. Safe for arbitrarily many concurrent callers across
/// process boundaries because all mutable state lives in the store.
///
/// Boundary rule for every algorithm: a request that brings the running
/// count exactly to the limit is allowed; only counts beyond it are
/// denied.
pub struct RateLimitAppService {
    engine: RateLimitEngine,
    counters: Arc<dyn CounterStore>,
    metrics: Arc<dyn MetricsPort>,
    enabled: bool,
}

impl RateLimitAppService {
    pub fn new(
        engine: RateLimitEngine,
        counters: Arc<dyn CounterStore>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            engine,
            counters,
            metrics,
            enabled: true,
        }
    }

    /// Admission check for the rule with the given ID.
    pub fn check(&self, rule_id: &RuleId, identity: &str) -> Result<RateLimitDecision, DomainError> {
        let rule = self.engine.rule(rule_id)?;
        self.check_rule(rule, identity, now_ms())
    }

    /// Admission check against an explicit rule at an explicit time.
    pub fn check_rule(
        &self,
        rule: &RateLimitRule,
        identity: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, DomainError> {
        if !self.enabled || !rule.enabled {
            return Ok(RateLimitDecision::allow());
        }

        let decision = match rule.algorithm {
            RateLimitAlgorithm::FixedWindow => self.check_fixed_window(rule, identity, now_ms)?,
            RateLimitAlgorithm::SlidingWindow => self.check_sliding_window(rule, identity, now_ms)?,
            RateLimitAlgorithm::TokenBucket => self.check_token_bucket(rule, identity, now_ms)?,
            RateLimitAlgorithm::LeakyBucket => self.check_leaky_bucket(rule, identity, now_ms)?,
        };

        self.metrics
            .record_decision(rule.algorithm.as_str(), decision.allowed);
        if !decision.allowed {
            tracing::debug!(
                rule_id = %rule.id,
                identity,
                algorithm = %rule.algorithm,
                retry_after_secs = decision.retry_after_secs,
                "rate limit exceeded"
            );
        }
        Ok(decision)
    }

    /// Atomic increment on a counter keyed by the window start; deny once
    /// the count exceeds the limit.
    fn check_fixed_window(
        &self,
        rule: &RateLimitRule,
        identity: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, DomainError> {
        let window = window_start_ms(now_ms, rule.window_secs);
        let key = format!("{}:{}", rule.counter_key(identity), window);
        let count = self.counters.increment_and_get(&key, 1)?;
        if count <= rule.limit {
            Ok(RateLimitDecision::allow())
        } else {
            Ok(RateLimitDecision::deny(secs_until_window_end(
                now_ms,
                rule.window_secs,
            )))
        }
    }

    /// Weighted blend of the previous and current windows; no
    /// per-request log is kept.
    fn check_sliding_window(
        &self,
        rule: &RateLimitRule,
        identity: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, DomainError> {
        let window = window_start_ms(now_ms, rule.window_secs);
        let prefix = rule.counter_key(identity);
        let curr_key = format!("{prefix}:{window}");

        let prev = match window.checked_sub(rule.window_ms()) {
            Some(prev_window) => self.counters.get(&format!("{prefix}:{prev_window}"))?,
            None => 0,
        };
        let curr = self.counters.increment_and_get(&curr_key, 1)?;
        let weighted = sliding_window_count(prev, curr, now_ms, rule.window_secs);
        if weighted <= rule.limit {
            Ok(RateLimitDecision::allow())
        } else {
            Ok(RateLimitDecision::deny(secs_until_window_end(
                now_ms,
                rule.window_secs,
            )))
        }
    }

    /// CAS loop over packed `(tokens, last_refill)` state.
    fn check_token_bucket(
        &self,
        rule: &RateLimitRule,
        identity: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, DomainError> {
        let key = rule.counter_key(identity);
        for _ in 0..MAX_CAS_ATTEMPTS {
            let packed = self.counters.get(&key)?;
            let state = refill_tokens(
                packed,
                now_ms,
                rule.limit,
                rule.window_secs,
                rule.burst_capacity,
            );
            if state.tokens == 0 {
                return Ok(RateLimitDecision::deny(secs_until_next_token(
                    state.last_refill_ms,
                    now_ms,
                    rule.limit,
                    rule.window_secs,
                )));
            }
            let next = pack_state(state.tokens - 1, state.last_refill_ms);
            if self.counters.compare_and_swap(&key, packed, next)? {
                return Ok(RateLimitDecision::allow());
            }
            // Lost the race; re-read and retry.
        }
        Err(DomainError::StoreFailed(format!(
            "token bucket CAS contention exceeded {MAX_CAS_ATTEMPTS} attempts"
        )))
    }

    /// CAS loop over packed `(depth, last_drain)` state; admit while the
    /// post-drain depth is below capacity.
    fn check_leaky_bucket(
        &self,
        rule: &RateLimitRule,
        identity: &str,
        now_ms: u64,
    ) -> Result<RateLimitDecision, DomainError> {
        let key = rule.counter_key(identity);
        for _ in 0..MAX_CAS_ATTEMPTS {
            let packed = self.counters.get(&key)?;
            let state = drain_queue(packed, now_ms, rule.limit, rule.window_secs);
            if state.tokens >= rule.limit {
                return Ok(RateLimitDecision::deny(secs_until_next_token(
                    state.last_refill_ms,
                    now_ms,
                    rule.limit,
                    rule.window_secs,
                )));
            }
            let next = pack_state(state.tokens + 1, state.last_refill_ms);
            if self.counters.compare_and_swap(&key, packed, next)? {
                return Ok(RateLimitDecision::allow());
            }
        }
        Err(DomainError::StoreFailed(format!(
            "leaky bucket CAS contention exceeded {MAX_CAS_ATTEMPTS} attempts"
        )))
    }

    // ── Rule management ────────────────────────────────────────────────

    pub fn add_rule(&mut self, rule: RateLimitRule) -> Result<(), DomainError> {
        self.engine.add_rule(rule)?;
        self.update_metrics();
        Ok(())
    }

    pub fn remove_rule(&mut self, id: &RuleId) -> Result<(), DomainError> {
        self.engine.remove_rule(id)?;
        self.update_metrics();
        Ok(())
    }

    pub fn reload_rules(&mut self, rules: Vec<RateLimitRule>) -> Result<(), DomainError> {
        self.engine.reload(rules)?;
        self.update_metrics();
        Ok(())
    }

    pub fn rules(&self) -> &[RateLimitRule] {
        self.engine.rules()
    }

    pub fn rule_count(&self) -> usize {
        self.engine.rule_count()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn update_metrics(&self) {
        self.metrics
            .set_rules_loaded("ratelimit", self.engine.rule_count() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ratelimit::entity::RateLimitScope;
    use ports::test_utils::{InMemoryCounterStore, NoopMetrics};

    fn make_service() -> RateLimitAppService {
        RateLimitAppService::new(
            RateLimitEngine::new(),
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(NoopMetrics),
        )
    }

    fn make_rule(algorithm: RateLimitAlgorithm, limit: u64, window: u64, burst: u64) -> RateLimitRule {
        RateLimitRule {
            id: RuleId("rl-001".to_string()),
            scope: RateLimitScope::User,
            algorithm,
            limit,
            window_secs: window,
            burst_capacity: burst,
            enabled: true,
        }
    }

    // ── Fixed window ──────────────────────────────────────────────────

    #[test]
    fn fixed_window_admits_up_to_limit() {
        // RateLimitRule(limit=100, window=60s): 101 requests within 10s →
        // 100 allowed, the 101st denied with retry_after ≈ 50s.
        let svc = make_service();
        let rule = make_rule(RateLimitAlgorithm::FixedWindow, 100, 60, 0);

        // All requests land 10s into the window.
        let now = 10_000;
        for _ in 0..100 {
            assert!(svc.check_rule(&rule, "alice", now).unwrap().allowed);
        }
        let denied = svc.check_rule(&rule, "alice", now).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, 50);
    }

    #[test]
    fn fixed_window_boundary_value_is_admitted() {
        let svc = make_service();
        let rule = make_rule(RateLimitAlgorithm::FixedWindow, 3, 60, 0);
        // The request that makes the count exactly 3 (== limit) passes.
        assert!(svc.check_rule(&rule, "u", 0).unwrap().allowed);
        assert!(svc.check_rule(&rule, "u", 0).unwrap().allowed);
        assert!(svc.check_rule(&rule, "u", 0).unwrap().allowed);
        assert!(!svc.check_rule(&rule, "u", 0).unwrap().allowed);
    }

    #[test]
    fn fixed_window_resets_at_boundary() {
        let svc = make_service();
        let rule = make_rule(RateLimitAlgorithm::FixedWindow, 1, 60, 0);
        assert!(svc.check_rule(&rule, "u", 1_000).unwrap().allowed);
        assert!(!svc.check_rule(&rule, "u", 2_000).unwrap().allowed);
        // Next window, fresh counter.
        assert!(svc.check_rule(&rule, "u", 61_000).unwrap().allowed);
    }

    #[test]
    fn fixed_window_identities_are_isolated() {
        let svc = make_service();
        let rule = make_rule(RateLimitAlgorithm::FixedWindow, 1, 60, 0);
        assert!(svc.check_rule(&rule, "alice", 0).unwrap().allowed);
        assert!(svc.check_rule(&rule, "bob", 0).unwrap().allowed);
        assert!(!svc.check_rule(&rule, "alice", 0).unwrap().allowed);
    }

    // ── Sliding window ────────────────────────────────────────────────

    #[test]
    fn sliding_window_weighs_previous_window() {
        let svc = make_service();
        let rule = make_rule(RateLimitAlgorithm::SlidingWindow, 10, 60, 0);

        // Fill the first window to the limit.
        for _ in 0..10 {
            assert!(svc.check_rule(&rule, "u", 30_000).unwrap().allowed);
        }
        // Early in the next window the previous one still weighs ~95%:
        // weighted = 1 + 10 * 57/60 = 10 → boundary, allowed.
        assert!(svc.check_rule(&rule, "u", 63_000).unwrap().allowed);
        // A second early request pushes past the limit.
        assert!(!svc.check_rule(&rule, "u", 63_100).unwrap().allowed);
        // Near the end of the next window the weight has decayed.
        assert!(svc.check_rule(&rule, "u", 115_000).unwrap().allowed);
    }

    // ── Token bucket ──────────────────────────────────────────────────

    #[test]
    fn token_bucket_burst_then_deny() {
        // burstCapacity=C: C+1 instantaneous requests → exactly C allowed.
        let svc = make_service();
        let c = 5;
        let rule = make_rule(RateLimitAlgorithm::TokenBucket, 10, 1, c);

        let now = 1_000_000;
        let mut allowed = 0;
        let mut denied = 0;
        for _ in 0..=c {
            if svc.check_rule(&rule, "u", now).unwrap().allowed {
                allowed += 1;
            } else {
                denied += 1;
            }
        }
        assert_eq!(allowed, c);
        assert_eq!(denied, 1);
    }

    #[test]
    fn token_bucket_refills_over_time() {
        let svc = make_service();
        // 10 tokens/sec, burst 2.
        let rule = make_rule(RateLimitAlgorithm::TokenBucket, 10, 1, 2);

        let t0 = 1_000_000;
        assert!(svc.check_rule(&rule, "u", t0).unwrap().allowed);
        assert!(svc.check_rule(&rule, "u", t0).unwrap().allowed);
        assert!(!svc.check_rule(&rule, "u", t0).unwrap().allowed);

        // 100ms later one token has refilled.
        assert!(svc.check_rule(&rule, "u", t0 + 100).unwrap().allowed);
        assert!(!svc.check_rule(&rule, "u", t0 + 100).unwrap().allowed);
    }

    #[test]
    fn token_bucket_denial_reports_retry_after() {
        let svc = make_service();
        // 1 token/sec.
        let rule = make_rule(RateLimitAlgorithm::TokenBucket, 1, 1, 1);
        let t0 = 1_000_000;
        assert!(svc.check_rule(&rule, "u", t0).unwrap().allowed);
        let denied = svc.check_rule(&rule, "u", t0).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, 1);
    }

    // ── Leaky bucket ──────────────────────────────────────────────────

    #[test]
    fn leaky_bucket_admits_until_capacity() {
        let svc = make_service();
        // Capacity (= limit) 3, draining 3/60s.
        let rule = make_rule(RateLimitAlgorithm::LeakyBucket, 3, 60, 0);
        let now = 1_000_000;
        assert!(svc.check_rule(&rule, "u", now).unwrap().allowed);
        assert!(svc.check_rule(&rule, "u", now).unwrap().allowed);
        assert!(svc.check_rule(&rule, "u", now).unwrap().allowed);
        assert!(!svc.check_rule(&rule, "u", now).unwrap().allowed);
    }

    #[test]
    fn leaky_bucket_drains_over_time() {
        let svc = make_service();
        // Capacity 2, draining 2 per 1s → one slot every 500ms.
        let rule = make_rule(RateLimitAlgorithm::LeakyBucket, 2, 1, 0);
        let t0 = 1_000_000;
        assert!(svc.check_rule(&rule, "u", t0).unwrap().allowed);
        assert!(svc.check_rule(&rule, "u", t0).unwrap().allowed);
        assert!(!svc.check_rule(&rule, "u", t0).unwrap().allowed);
        // After one drain interval a slot frees up.
        assert!(svc.check_rule(&rule, "u", t0 + 500).unwrap().allowed);
    }

    // ── Registry and toggles ──────────────────────────────────────────

    #[test]
    fn check_by_id_uses_registered_rule() {
        let mut svc = make_service();
        svc.add_rule(make_rule(RateLimitAlgorithm::FixedWindow, 1, 60, 0))
            .unwrap();
        let id = RuleId("rl-001".to_string());
        assert!(svc.check(&id, "u").unwrap().allowed);
        assert!(!svc.check(&id, "u").unwrap().allowed);
    }

    #[test]
    fn check_unknown_rule_not_found() {
        let svc = make_service();
        assert!(matches!(
            svc.check(&RuleId("nope".to_string()), "u").unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[test]
    fn disabled_rule_always_allows() {
        let svc = make_service();
        let mut rule = make_rule(RateLimitAlgorithm::FixedWindow, 1, 60, 0);
        rule.enabled = false;
        for _ in 0..10 {
            assert!(svc.check_rule(&rule, "u", 0).unwrap().allowed);
        }
    }

    #[test]
    fn disabled_service_always_allows() {
        let mut svc = make_service();
        svc.set_enabled(false);
        let rule = make_rule(RateLimitAlgorithm::FixedWindow, 1, 60, 0);
        for _ in 0..10 {
            assert!(svc.check_rule(&rule, "u", 0).unwrap().allowed);
        }
    }

    #[test]
    fn global_scope_shares_one_bucket() {
        let svc = make_service();
        let mut rule = make_rule(RateLimitAlgorithm::FixedWindow, 1, 60, 0);
        rule.scope = RateLimitScope::Global;
        assert!(svc.check_rule(&rule, "alice", 0).unwrap().allowed);
        assert!(!svc.check_rule(&rule, "bob", 0).unwrap().allowed);
    }
}
