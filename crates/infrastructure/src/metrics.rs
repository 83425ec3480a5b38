use ports::secondary::metrics_port::{
    ConfigMetrics, PolicyMetrics, PropagationMetrics, RateLimitMetrics, SecretsMetrics,
    SystemMetrics,
};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

// ── Label types ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct WriteLabels {
    pub environment: String,
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KindLabels {
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ComponentLabels {
    pub component: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DecisionLabels {
    pub algorithm: String,
    pub allowed: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EvaluationLabels {
    pub decision: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReasonLabels {
    pub reason: String,
}

// ── Agent metrics registry ──────────────────────────────────────────

/// Prometheus metrics registry for the control plane.
///
/// All metric families use interior mutability (atomics), so recording
/// metrics only requires `&self`. The registry itself is NOT Clone —
/// wrap in `Arc` for multi-task sharing.
pub struct AgentMetrics {
    registry: Registry,
    pub config_writes_total: Family<WriteLabels, Counter>,
    pub version_conflicts_total: Family<KindLabels, Counter>,
    pub config_entries: Gauge,
    pub secret_reads_total: Family<ResultLabels, Counter>,
    pub audit_failures_total: Counter,
    pub rotations_total: Family<ResultLabels, Counter>,
    pub secrets_total: Gauge,
    pub deprecated_versions: Gauge,
    pub ratelimit_decisions_total: Family<DecisionLabels, Counter>,
    pub rules_loaded: Family<ComponentLabels, Gauge>,
    pub policy_evaluations_total: Family<EvaluationLabels, Counter>,
    pub policies_loaded: Gauge,
    pub events_published_total: Family<KindLabels, Counter>,
    pub events_dropped_total: Family<ReasonLabels, Counter>,
    pub subscribers_dropped_total: Counter,
    pub subscribers_connected: Gauge,
    pub memory_usage_bytes: Gauge,
    pub cpu_usage_percent: Gauge<f64, AtomicU64>,
}

impl AgentMetrics {
    /// Create a new metrics registry with all metrics registered under
    /// the `steward` prefix.
    #[allow(clippy::too_many_lines)]
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("steward");

        let config_writes_total = Family::<WriteLabels, Counter>::default();
        registry.register(
            "config_writes",
            "Config write attempts by environment and result",
            config_writes_total.clone(),
        );

        let version_conflicts_total = Family::<KindLabels, Counter>::default();
        registry.register(
            "version_conflicts",
            "Writes rejected due to a stale expected version",
            version_conflicts_total.clone(),
        );

        let config_entries = Gauge::default();
        registry.register(
            "config_entries",
            "Number of live config entries",
            config_entries.clone(),
        );

        let secret_reads_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "secret_reads",
            "Secret read attempts by result",
            secret_reads_total.clone(),
        );

        let audit_failures_total = Counter::default();
        registry.register(
            "audit_failures",
            "Access-log writes that failed a secret read closed",
            audit_failures_total.clone(),
        );

        let rotations_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "rotations",
            "Secret rotations by result",
            rotations_total.clone(),
        );

        let secrets_total = Gauge::default();
        registry.register("secrets", "Number of stored secrets", secrets_total.clone());

        let deprecated_versions = Gauge::default();
        registry.register(
            "deprecated_versions",
            "Secret versions currently inside a grace window",
            deprecated_versions.clone(),
        );

        let ratelimit_decisions_total = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "ratelimit_decisions",
            "Admission decisions by algorithm and outcome",
            ratelimit_decisions_total.clone(),
        );

        let rules_loaded = Family::<ComponentLabels, Gauge>::default();
        registry.register(
            "rules_loaded",
            "Number of active rules per component",
            rules_loaded.clone(),
        );

        let policy_evaluations_total = Family::<EvaluationLabels, Counter>::default();
        registry.register(
            "policy_evaluations",
            "Policy evaluations by decision",
            policy_evaluations_total.clone(),
        );

        let policies_loaded = Gauge::default();
        registry.register(
            "policies_loaded",
            "Number of stored policies (latest versions)",
            policies_loaded.clone(),
        );

        let events_published_total = Family::<KindLabels, Counter>::default();
        registry.register(
            "events_published",
            "Change events accepted for propagation",
            events_published_total.clone(),
        );

        let events_dropped_total = Family::<ReasonLabels, Counter>::default();
        registry.register(
            "events_dropped",
            "Change events dropped by the propagator",
            events_dropped_total.clone(),
        );

        let subscribers_dropped_total = Counter::default();
        registry.register(
            "subscribers_dropped",
            "Subscribers dropped for exceeding their buffer",
            subscribers_dropped_total.clone(),
        );

        let subscribers_connected = Gauge::default();
        registry.register(
            "subscribers_connected",
            "Currently connected change subscribers",
            subscribers_connected.clone(),
        );

        let memory_usage_bytes = Gauge::default();
        registry.register(
            "memory_usage_bytes",
            "Process resident set size (RSS) in bytes",
            memory_usage_bytes.clone(),
        );

        let cpu_usage_percent: Gauge<f64, AtomicU64> = Gauge::default();
        registry.register(
            "cpu_usage_percent",
            "Process CPU usage percentage",
            cpu_usage_percent.clone(),
        );

        Self {
            registry,
            config_writes_total,
            version_conflicts_total,
            config_entries,
            secret_reads_total,
            audit_failures_total,
            rotations_total,
            secrets_total,
            deprecated_versions,
            ratelimit_decisions_total,
            rules_loaded,
            policy_evaluations_total,
            policies_loaded,
            events_published_total,
            events_dropped_total,
            subscribers_dropped_total,
            subscribers_connected,
            memory_usage_bytes,
            cpu_usage_percent,
        }
    }

    /// Encode all registered metrics to `OpenMetrics` text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics to string should not fail");
        buffer
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ── Sub-trait implementations ──────────────────────────────────────

impl ConfigMetrics for AgentMetrics {
    fn record_config_write(&self, environment: &str, result: &str) {
        self.config_writes_total
            .get_or_create(&WriteLabels {
                environment: environment.to_string(),
                result: result.to_string(),
            })
            .inc();
    }

    fn record_version_conflict(&self, kind: &str) {
        self.version_conflicts_total
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    fn set_config_entries(&self, count: u64) {
        self.config_entries.set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl SecretsMetrics for AgentMetrics {
    fn record_secret_read(&self, result: &str) {
        self.secret_reads_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn record_audit_failure(&self) {
        self.audit_failures_total.inc();
    }

    fn record_rotation(&self, result: &str) {
        self.rotations_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn set_secrets_total(&self, count: u64) {
        self.secrets_total.set(count.try_into().unwrap_or(i64::MAX));
    }

    fn set_deprecated_versions(&self, count: u64) {
        self.deprecated_versions
            .set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl RateLimitMetrics for AgentMetrics {
    fn record_decision(&self, algorithm: &str, allowed: bool) {
        self.ratelimit_decisions_total
            .get_or_create(&DecisionLabels {
                algorithm: algorithm.to_string(),
                allowed: allowed.to_string(),
            })
            .inc();
    }

    fn set_rules_loaded(&self, component: &str, count: u64) {
        self.rules_loaded
            .get_or_create(&ComponentLabels {
                component: component.to_string(),
            })
            .set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl PolicyMetrics for AgentMetrics {
    fn record_evaluation(&self, decision: &str) {
        self.policy_evaluations_total
            .get_or_create(&EvaluationLabels {
                decision: decision.to_string(),
            })
            .inc();
    }

    fn set_policies_loaded(&self, count: u64) {
        self.policies_loaded.set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl PropagationMetrics for AgentMetrics {
    fn record_event_published(&self, kind: &str) {
        self.events_published_total
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    fn record_event_dropped(&self, reason: &str) {
        self.events_dropped_total
            .get_or_create(&ReasonLabels {
                reason: reason.to_string(),
            })
            .inc();
    }

    fn record_subscriber_dropped(&self) {
        self.subscribers_dropped_total.inc();
    }

    fn set_subscribers(&self, count: u64) {
        self.subscribers_connected
            .set(count.try_into().unwrap_or(i64::MAX));
    }
}

impl SystemMetrics for AgentMetrics {
    fn set_memory_usage_bytes(&self, bytes: u64) {
        self.memory_usage_bytes
            .set(bytes.try_into().unwrap_or(i64::MAX));
    }

    fn set_cpu_usage_percent(&self, percent: f64) {
        self.cpu_usage_percent.set(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_contains_registered_metrics() {
        let metrics = AgentMetrics::new();
        metrics.record_config_write("prod", "success");
        metrics.record_decision("token_bucket", true);
        metrics.record_secret_read("success");

        let encoded = metrics.encode();
        assert!(encoded.contains("steward_config_writes_total"));
        assert!(encoded.contains("steward_ratelimit_decisions_total"));
        assert!(encoded.contains("steward_secret_reads_total"));
    }

    #[test]
    fn gauges_accept_updates() {
        let metrics = AgentMetrics::new();
        metrics.set_config_entries(42);
        metrics.set_secrets_total(7);
        metrics.set_subscribers(3);
        let encoded = metrics.encode();
        assert!(encoded.contains("steward_config_entries 42"));
        assert!(encoded.contains("steward_secrets 7"));
    }

    #[test]
    fn counters_increment() {
        let metrics = AgentMetrics::new();
        metrics.record_audit_failure();
        metrics.record_audit_failure();
        assert!(metrics.encode().contains("steward_audit_failures_total 2"));
    }
}
