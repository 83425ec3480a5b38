use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use domain::common::error::DomainError;
use ports::secondary::counter_store::CounterStore;

/// Number of independently-locked shards. Must be a power of two.
const SHARD_COUNT: usize = 16;

/// In-process `CounterStore` backed by sharded atomic counters.
///
/// The default backing for a single-node deployment and the fixture for
/// tests. Each key maps to an `AtomicU64`; shard locks are only taken to
/// create or look up the atomic, every counter operation itself is
/// lock-free. A multi-instance deployment swaps this adapter for a
/// shared store behind the same port.
pub struct MemoryCounterStore {
    shards: Vec<RwLock<HashMap<String, &'static AtomicU64>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard_for(&self, key: &str) -> &RwLock<HashMap<String, &'static AtomicU64>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) & (SHARD_COUNT - 1)]
    }

    /// The atomic for `key`, created on first use.
    ///
    /// Counters are leaked intentionally: rate-limit keys are bounded by
    /// (rules × identities × recent windows) and each entry is 8 bytes;
    /// leaking them keeps every counter operation lock-free.
    fn counter(&self, key: &str) -> Result<&'static AtomicU64, DomainError> {
        let shard = self.shard_for(key);
        {
            let map = shard
                .read()
                .map_err(|e| DomainError::StoreFailed(format!("shard lock poisoned: {e}")))?;
            if let Some(counter) = map.get(key) {
                return Ok(counter);
            }
        }
        let mut map = shard
            .write()
            .map_err(|e| DomainError::StoreFailed(format!("shard lock poisoned: {e}")))?;
        Ok(map
            .entry(key.to_string())
            .or_insert_with(|| Box::leak(Box::new(AtomicU64::new(0)))))
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for MemoryCounterStore {
    fn increment_and_get(&self, key: &str, delta: u64) -> Result<u64, DomainError> {
        Ok(self.counter(key)?.fetch_add(delta, Ordering::AcqRel) + delta)
    }

    fn get(&self, key: &str) -> Result<u64, DomainError> {
        Ok(self.counter(key)?.load(Ordering::Acquire))
    }

    fn compare_and_swap(&self, key: &str, current: u64, new: u64) -> Result<bool, DomainError> {
        Ok(self
            .counter(key)?
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn increment_and_get() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment_and_get("k", 1).unwrap(), 1);
        assert_eq!(store.increment_and_get("k", 2).unwrap(), 3);
        assert_eq!(store.get("k").unwrap(), 3);
    }

    #[test]
    fn missing_key_reads_zero() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.get("missing").unwrap(), 0);
    }

    #[test]
    fn compare_and_swap_semantics() {
        let store = MemoryCounterStore::new();
        assert!(store.compare_and_swap("k", 0, 10).unwrap());
        assert!(!store.compare_and_swap("k", 0, 20).unwrap());
        assert!(store.compare_and_swap("k", 10, 20).unwrap());
        assert_eq!(store.get("k").unwrap(), 20);
    }

    #[test]
    fn keys_are_independent() {
        let store = MemoryCounterStore::new();
        store.increment_and_get("a", 5).unwrap();
        assert_eq!(store.get("b").unwrap(), 0);
    }

    #[test]
    fn concurrent_increments_lose_nothing() {
        let store = Arc::new(MemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    store.increment_and_get("shared", 1).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("shared").unwrap(), 8000);
    }

    #[test]
    fn concurrent_cas_admits_exactly_capacity() {
        // Simulates the token-bucket contract: starting from 100, eight
        // threads CAS-decrement; exactly 100 decrements may win.
        let store = Arc::new(MemoryCounterStore::new());
        store.compare_and_swap("tokens", 0, 100).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let mut wins = 0u64;
                loop {
                    let current = store.get("tokens").unwrap();
                    if current == 0 {
                        break;
                    }
                    if store.compare_and_swap("tokens", current, current - 1).unwrap() {
                        wins += 1;
                    }
                }
                wins
            }));
        }
        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100);
        assert_eq!(store.get("tokens").unwrap(), 0);
    }
}
