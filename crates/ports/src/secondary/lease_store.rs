use domain::common::error::DomainError;

/// Secondary port for coordination leases.
///
/// The rotation scheduler acquires a per-policy lease before rotating so
/// that only one scheduler instance performs a given rotation at a time.
/// The shipped adapter is in-memory (single node); a shared store
/// implements the same interface for multi-instance deployments.
pub trait LeaseStore: Send + Sync {
    /// Try to acquire (or re-acquire, if already held by `holder`) the
    /// named lease for `ttl_ms`. Returns whether the lease is now held.
    fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<bool, DomainError>;

    /// Release the named lease if held by `holder`.
    fn release(&self, name: &str, holder: &str) -> Result<(), DomainError>;
}
