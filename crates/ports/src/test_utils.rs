//! In-memory port fakes shared by unit tests across crates.

use std::collections::HashMap;
use std::sync::Mutex;

use domain::audit::entity::ChangeRecord;
use domain::audit::error::AuditError;
use domain::audit::query::ChangeQuery;
use domain::common::error::DomainError;
use domain::config::entity::{ConfigChange, ConfigEntry};
use domain::policy::entity::Policy;
use domain::rotation::entity::RotationPolicy;
use domain::secrets::entity::{EncryptedBlob, Secret, SecretAccessRecord};
use domain::secrets::query::AccessLogQuery;

use crate::secondary::access_log_store::AccessLogStore;
use crate::secondary::change_log_store::ChangeLogStore;
use crate::secondary::config_entry_store::ConfigEntryStore;
use crate::secondary::counter_store::CounterStore;
use crate::secondary::lease_store::LeaseStore;
use crate::secondary::metrics_port::{
    ConfigMetrics, PolicyMetrics, PropagationMetrics, RateLimitMetrics, SecretsMetrics,
    SystemMetrics,
};
use crate::secondary::policy_store::PolicyStore;
use crate::secondary::secret_cipher::SecretCipher;
use crate::secondary::secret_store::SecretStore;

/// No-op implementation of all metrics sub-traits for use in tests.
///
/// All methods inherit the default no-op implementations from the
/// sub-traits.
pub struct NoopMetrics;

impl ConfigMetrics for NoopMetrics {}
impl SecretsMetrics for NoopMetrics {}
impl RateLimitMetrics for NoopMetrics {}
impl PolicyMetrics for NoopMetrics {}
impl PropagationMetrics for NoopMetrics {}
impl SystemMetrics for NoopMetrics {}

/// Mutex-backed counter store fake with real CAS semantics.
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment_and_get(&self, key: &str, delta: u64) -> Result<u64, DomainError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    fn get(&self, key: &str) -> Result<u64, DomainError> {
        let counters = self
            .counters
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        Ok(counters.get(key).copied().unwrap_or(0))
    }

    fn compare_and_swap(&self, key: &str, current: u64, new: u64) -> Result<bool, DomainError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        let value = counters.entry(key.to_string()).or_insert(0);
        if *value == current {
            *value = new;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// In-memory TTL lease fake.
#[derive(Default)]
pub struct InMemoryLeaseStore {
    leases: Mutex<HashMap<String, (String, u64)>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseStore for InMemoryLeaseStore {
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
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        match leases.get(name) {
            Some((current_holder, expires_at))
                if *expires_at > now_ms && current_holder != holder =>
            {
                Ok(false)
            }
            _ => {
                leases.insert(name.to_string(), (holder.to_string(), now_ms + ttl_ms));
                Ok(true)
            }
        }
    }

    fn release(&self, name: &str, holder: &str) -> Result<(), DomainError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        if leases.get(name).is_some_and(|(h, _)| h == holder) {
            leases.remove(name);
        }
        Ok(())
    }
}

/// Reversible XOR "cipher" for tests. Obviously not secure — it only
/// exercises the envelope flow without a crypto dependency.
pub struct XorCipher {
    pub key: u8,
}

impl Default for XorCipher {
    fn default() -> Self {
        Self { key: 0x5A }
    }
}

impl SecretCipher for XorCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, DomainError> {
        Ok(EncryptedBlob {
            ciphertext: plaintext.iter().map(|b| b ^ self.key).collect(),
            nonce: vec![0; 12],
            wrapped_data_key: vec![self.key],
            algorithm: "xor-test".to_string(),
        })
    }

    fn decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>, DomainError> {
        let key = *blob
            .wrapped_data_key
            .first()
            .ok_or_else(|| DomainError::EncryptionFailed("empty data key".to_string()))?;
        Ok(blob.ciphertext.iter().map(|b| b ^ key).collect())
    }
}

/// In-memory config entry store fake.
#[derive(Default)]
pub struct InMemoryConfigStore {
    #[allow(clippy::type_complexity)]
    entries: Mutex<HashMap<(String, String), (ConfigEntry, Vec<ConfigChange>)>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigEntryStore for InMemoryConfigStore {
    fn persist(&self, entry: &ConfigEntry, change: &ConfigChange) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        let key = (entry.environment.0.clone(), entry.key.0.clone());
        let slot = entries
            .entry(key)
            .or_insert_with(|| (entry.clone(), Vec::new()));
        slot.0 = entry.clone();
        slot.1.push(change.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<(ConfigEntry, Vec<ConfigChange>)>, DomainError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        Ok(entries.values().cloned().collect())
    }
}

/// In-memory secret store fake.
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<HashMap<String, Secret>>,
    policies: Mutex<HashMap<String, RotationPolicy>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn persist_secret(&self, secret: &Secret) -> Result<(), DomainError> {
        let mut secrets = self
            .secrets
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        secrets.insert(secret.name.0.clone(), secret.clone());
        Ok(())
    }

    fn load_secrets(&self) -> Result<Vec<Secret>, DomainError> {
        let secrets = self
            .secrets
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        Ok(secrets.values().cloned().collect())
    }

    fn persist_policy(&self, policy: &RotationPolicy) -> Result<(), DomainError> {
        let mut policies = self
            .policies
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        policies.insert(policy.secret_name.clone(), policy.clone());
        Ok(())
    }

    fn remove_policy(&self, secret_name: &str) -> Result<(), DomainError> {
        let mut policies = self
            .policies
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        policies.remove(secret_name);
        Ok(())
    }

    fn load_policies(&self) -> Result<Vec<RotationPolicy>, DomainError> {
        let policies = self
            .policies
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        Ok(policies.values().cloned().collect())
    }
}

/// In-memory access log fake. Can be switched to fail writes, to test
/// the fail-closed read path.
#[derive(Default)]
pub struct InMemoryAccessLog {
    records: Mutex<Vec<SecretAccessRecord>>,
    pub fail_writes: std::sync::atomic::AtomicBool,
}

impl InMemoryAccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<SecretAccessRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl AccessLogStore for InMemoryAccessLog {
    fn store_record(&self, record: &SecretAccessRecord) -> Result<(), DomainError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DomainError::AuditFailed("simulated failure".to_string()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|e| DomainError::AuditFailed(format!("lock poisoned: {e}")))?;
        records.push(record.clone());
        Ok(())
    }

    fn query_records(&self, query: &AccessLogQuery) -> Result<Vec<SecretAccessRecord>, DomainError> {
        let records = self
            .records
            .lock()
            .map_err(|e| DomainError::AuditFailed(format!("lock poisoned: {e}")))?;
        let mut matched: Vec<SecretAccessRecord> = records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matched.reverse();
        let limit = if query.limit == 0 { usize::MAX } else { query.limit };
        Ok(matched.into_iter().skip(query.offset).take(limit).collect())
    }

    fn cleanup_expired(&self, before_ms: u64) -> Result<usize, DomainError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| DomainError::AuditFailed(format!("lock poisoned: {e}")))?;
        let before = records.len();
        records.retain(|r| r.accessed_at_ms >= before_ms);
        Ok(before - records.len())
    }

    fn record_count(&self) -> Result<usize, DomainError> {
        Ok(self
            .records
            .lock()
            .map_err(|e| DomainError::AuditFailed(format!("lock poisoned: {e}")))?
            .len())
    }
}

/// In-memory change log fake.
#[derive(Default)]
pub struct InMemoryChangeLog {
    records: Mutex<Vec<ChangeRecord>>,
}

impl InMemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeLogStore for InMemoryChangeLog {
    fn store_record(&self, record: &ChangeRecord) -> Result<(), AuditError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| AuditError::WriteFailed(format!("lock poisoned: {e}")))?;
        records.push(record.clone());
        Ok(())
    }

    fn query_records(&self, query: &ChangeQuery) -> Result<Vec<ChangeRecord>, AuditError> {
        let records = self
            .records
            .lock()
            .map_err(|e| AuditError::QueryFailed(format!("lock poisoned: {e}")))?;
        let mut matched: Vec<ChangeRecord> =
            records.iter().filter(|r| query.matches(r)).cloned().collect();
        matched.reverse();
        let limit = if query.limit == 0 { usize::MAX } else { query.limit };
        Ok(matched.into_iter().skip(query.offset).take(limit).collect())
    }

    fn cleanup_expired(&self, before_ms: u64) -> Result<usize, AuditError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| AuditError::WriteFailed(format!("lock poisoned: {e}")))?;
        let before = records.len();
        records.retain(|r| r.timestamp_ms >= before_ms);
        Ok(before - records.len())
    }

    fn record_count(&self) -> Result<usize, AuditError> {
        Ok(self
            .records
            .lock()
            .map_err(|e| AuditError::QueryFailed(format!("lock poisoned: {e}")))?
            .len())
    }
}

/// In-memory policy store fake.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    versions: Mutex<Vec<Policy>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn persist_version(&self, policy: &Policy) -> Result<(), DomainError> {
        let mut versions = self
            .versions
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        versions.push(policy.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Policy>, DomainError> {
        let versions = self
            .versions
            .lock()
            .map_err(|e| DomainError::StoreFailed(format!("lock poisoned: {e}")))?;
        Ok(versions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_store_increments() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.increment_and_get("k", 1).unwrap(), 1);
        assert_eq!(store.increment_and_get("k", 2).unwrap(), 3);
        assert_eq!(store.get("k").unwrap(), 3);
        assert_eq!(store.get("missing").unwrap(), 0);
    }

    #[test]
    fn counter_store_cas() {
        let store = InMemoryCounterStore::new();
        assert!(store.compare_and_swap("k", 0, 10).unwrap());
        assert!(!store.compare_and_swap("k", 0, 20).unwrap());
        assert!(store.compare_and_swap("k", 10, 20).unwrap());
        assert_eq!(store.get("k").unwrap(), 20);
    }

    #[test]
    fn lease_excludes_second_holder_until_expiry() {
        let store = InMemoryLeaseStore::new();
        assert!(store.try_acquire("rotation", "a", 1000, 0).unwrap());
        assert!(!store.try_acquire("rotation", "b", 1000, 500).unwrap());
        // Same holder renews.
        assert!(store.try_acquire("rotation", "a", 1000, 500).unwrap());
        // After expiry another holder can take it.
        assert!(store.try_acquire("rotation", "b", 1000, 2000).unwrap());
    }

    #[test]
    fn lease_release_only_by_holder() {
        let store = InMemoryLeaseStore::new();
        store.try_acquire("rotation", "a", 1000, 0).unwrap();
        store.release("rotation", "b").unwrap();
        assert!(!store.try_acquire("rotation", "b", 1000, 500).unwrap());
        store.release("rotation", "a").unwrap();
        assert!(store.try_acquire("rotation", "b", 1000, 500).unwrap());
    }

    #[test]
    fn xor_cipher_round_trips() {
        let cipher = XorCipher::default();
        let blob = cipher.encrypt(b"hunter2").unwrap();
        assert_ne!(blob.ciphertext, b"hunter2");
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"hunter2");
    }

    #[test]
    fn access_log_fail_writes_switch() {
        let log = InMemoryAccessLog::new();
        let record = SecretAccessRecord {
            secret_name: "api-key".to_string(),
            version: 1,
            accessed_by: "svc".to_string(),
            accessed_at_ms: 1000,
            success: true,
        };
        log.store_record(&record).unwrap();
        log.set_fail_writes(true);
        assert!(log.store_record(&record).is_err());
        assert_eq!(log.record_count().unwrap(), 1);
    }
}
