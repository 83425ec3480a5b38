use std::collections::HashMap;
use std::sync::Mutex;

use domain::common::error::DomainError;
use domain::rotation::entity::Lease;
use ports::secondary::lease_store::LeaseStore;

/// In-process `LeaseStore`.
///
/// Sufficient for a single-node deployment where the lease only guards
/// against overlapping rotations within one process; a multi-instance
/// deployment swaps in a shared store behind the same port.
pub struct MemoryLeaseStore {
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLeaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn try_acquire(
        &self,
        name: &str,
        holder: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<bool, DomainError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lease lock poisoned: {e}")))?;

        if let Some(lease) = leases.get(name) {
            if lease.expires_at_ms > now_ms && lease.holder != holder {
                return Ok(false);
            }
        }

        leases.insert(
            name.to_string(),
            Lease {
                name: name.to_string(),
                holder: holder.to_string(),
                expires_at_ms: now_ms + ttl_ms,
            },
        );
        Ok(true)
    }

    fn release(&self, name: &str, holder: &str) -> Result<(), DomainError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lease lock poisoned: {e}")))?;
        if leases.get(name).is_some_and(|lease| lease.holder == holder) {
            leases.remove(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_conflict() {
        let store = MemoryLeaseStore::new();
        assert!(store.try_acquire("rotation/api-key", "a", 1000, 0).unwrap());
        assert!(!store.try_acquire("rotation/api-key", "b", 1000, 500).unwrap());
    }

    #[test]
    fn same_holder_renews() {
        let store = MemoryLeaseStore::new();
        assert!(store.try_acquire("l", "a", 1000, 0).unwrap());
        assert!(store.try_acquire("l", "a", 1000, 900).unwrap());
        // Renewal extended the expiry.
        assert!(!store.try_acquire("l", "b", 1000, 1500).unwrap());
    }

    #[test]
    fn expired_lease_is_reacquirable() {
        let store = MemoryLeaseStore::new();
        assert!(store.try_acquire("l", "a", 1000, 0).unwrap());
        assert!(store.try_acquire("l", "b", 1000, 1001).unwrap());
    }

    #[test]
    fn release_only_by_holder() {
        let store = MemoryLeaseStore::new();
        store.try_acquire("l", "a", 1000, 0).unwrap();
        store.release("l", "b").unwrap();
        assert!(!store.try_acquire("l", "b", 1000, 500).unwrap());
        store.release("l", "a").unwrap();
        assert!(store.try_acquire("l", "b", 1000, 500).unwrap());
    }

    #[test]
    fn distinct_leases_are_independent() {
        let store = MemoryLeaseStore::new();
        assert!(store.try_acquire("rotation/a", "x", 1000, 0).unwrap());
        assert!(store.try_acquire("rotation/b", "y", 1000, 0).unwrap());
    }
}
