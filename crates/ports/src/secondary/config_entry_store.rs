use domain::common::error::DomainError;
use domain::config::entity::{ConfigChange, ConfigEntry};

/// Secondary port for persisting versioned config entries.
///
/// The in-memory engine is authoritative at runtime; this store is
/// written through on every successful mutation and replayed at startup.
/// History is append-only: `persist` adds exactly one change record and
/// never rewrites prior ones.
pub trait ConfigEntryStore: Send + Sync {
    /// Persist the entry's current state plus the one change record this
    /// mutation appended.
    fn persist(&self, entry: &ConfigEntry, change: &ConfigChange) -> Result<(), DomainError>;

    /// Load every entry with its full history, for engine hydration.
    fn load_all(&self) -> Result<Vec<(ConfigEntry, Vec<ConfigChange>)>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_entry_store_is_object_safe() {
        fn _check(store: &dyn ConfigEntryStore) {
            let _ = store.load_all();
        }
    }
}
