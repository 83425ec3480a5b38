// Focused sub-traits for recording Prometheus metrics, grouped by domain.
//
// All methods take `&self` because the underlying implementation uses
// atomic operations (interior mutability via `prometheus-client`).
//
// Default implementations are no-ops, allowing test mocks to implement
// only the sub-traits relevant to the service under test.

// ── Config store metrics ───────────────────────────────────────────

pub trait ConfigMetrics: Send + Sync {
    /// Record a config write attempt with environment and result labels.
    fn record_config_write(&self, _environment: &str, _result: &str) {}

    /// Record a rejected write due to a stale expected version.
    fn record_version_conflict(&self, _kind: &str) {}

    /// Set the number of live config entries.
    fn set_config_entries(&self, _count: u64) {}
}

// ── Secrets vault metrics ──────────────────────────────────────────

pub trait SecretsMetrics: Send + Sync {
    /// Record a secret read attempt (result: success / denied / error).
    fn record_secret_read(&self, _result: &str) {}

    /// Record a failed access-log write that failed a read closed.
    fn record_audit_failure(&self) {}

    /// Record a rotation (result: success / failure).
    fn record_rotation(&self, _result: &str) {}

    /// Set the number of stored secrets.
    fn set_secrets_total(&self, _count: u64) {}

    /// Set the number of versions currently inside a grace window.
    fn set_deprecated_versions(&self, _count: u64) {}
}

// ── Rate limiter metrics ───────────────────────────────────────────

pub trait RateLimitMetrics: Send + Sync {
    /// Record an admission decision for the given algorithm.
    fn record_decision(&self, _algorithm: &str, _allowed: bool) {}

    /// Set the number of active rules for a given component.
    fn set_rules_loaded(&self, _component: &str, _count: u64) {}
}

// ── Policy engine metrics ──────────────────────────────────────────

pub trait PolicyMetrics: Send + Sync {
    /// Record an evaluation outcome (allow / deny).
    fn record_evaluation(&self, _decision: &str) {}

    /// Set the number of stored policies (latest versions).
    fn set_policies_loaded(&self, _count: u64) {}
}

// ── Change propagation metrics ─────────────────────────────────────

pub trait PropagationMetrics: Send + Sync {
    /// Record a published change event by entity kind.
    fn record_event_published(&self, _kind: &str) {}

    /// Record an event dropped (queue full, no subscribers, etc.).
    fn record_event_dropped(&self, _reason: &str) {}

    /// Record a subscriber dropped for exceeding its buffer.
    fn record_subscriber_dropped(&self) {}

    /// Set the current number of connected subscribers.
    fn set_subscribers(&self, _count: u64) {}
}

// ── System resource metrics ────────────────────────────────────────

pub trait SystemMetrics: Send + Sync {
    /// Set the current process memory usage (RSS) in bytes.
    fn set_memory_usage_bytes(&self, _bytes: u64) {}

    /// Set the current process CPU usage as a percentage (0.0–100.0+).
    fn set_cpu_usage_percent(&self, _percent: f64) {}
}

// ── Composite super-trait ──────────────────────────────────────────

/// Unified metrics port composing all domain-specific sub-traits.
///
/// Services accept `Arc<dyn MetricsPort>` for full access. The sub-traits
/// provide default no-op implementations so that test mocks only need to
/// override the methods they care about.
pub trait MetricsPort:
    ConfigMetrics
    + SecretsMetrics
    + RateLimitMetrics
    + PolicyMetrics
    + PropagationMetrics
    + SystemMetrics
{
}

/// Blanket impl: anything implementing all sub-traits automatically
/// implements `MetricsPort`.
impl<T> MetricsPort for T where
    T: ConfigMetrics
        + SecretsMetrics
        + RateLimitMetrics
        + PolicyMetrics
        + PropagationMetrics
        + SystemMetrics
{
}
