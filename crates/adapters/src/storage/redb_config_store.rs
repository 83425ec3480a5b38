use std::collections::BTreeMap;
use std::path::Path;

use domain::common::error::DomainError;
use domain::config::entity::{ConfigChange, ConfigEntry};
use ports::secondary::config_entry_store::ConfigEntryStore;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

/// redb table: key = `(environment, key)`, value = JSON-serialized
/// `ConfigEntry` (current state).
const ENTRIES_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("config_entries");

/// redb table: key = `(environment, key, version)`, value =
/// JSON-serialized `ConfigChange`. Append-only; rows are never rewritten.
const HISTORY_TABLE: TableDefinition<(&str, &str, u64), &[u8]> =
    TableDefinition::new("config_history");

/// Persistent config store backed by redb.
///
/// Each mutation writes the entry's new state and appends exactly one
/// history row in a single transaction.
pub struct RedbConfigStore {
    db: Database,
}

impl RedbConfigStore {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path) -> Result<Self, DomainError> {
        let db = Database::create(path)
            .map_err(|e| DomainError::StoreFailed(format!("redb open failed: {e}")))?;

        let txn = db
            .begin_write()
            .map_err(|e| DomainError::StoreFailed(format!("redb txn begin: {e}")))?;
        {
            let _entries = txn
                .open_table(ENTRIES_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb table create: {e}")))?;
            let _history = txn
                .open_table(HISTORY_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb table create: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::StoreFailed(format!("redb commit: {e}")))?;

        Ok(Self { db })
    }
}

impl ConfigEntryStore for RedbConfigStore {
    fn persist(&self, entry: &ConfigEntry, change: &ConfigChange) -> Result<(), DomainError> {
        let entry_bytes = serde_json::to_vec(entry)
            .map_err(|e| DomainError::StoreFailed(format!("serialize entry: {e}")))?;
        let change_bytes = serde_json::to_vec(change)
            .map_err(|e| DomainError::StoreFailed(format!("serialize change: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| DomainError::StoreFailed(format!("redb write txn: {e}")))?;
        {
            let mut entries = txn
                .open_table(ENTRIES_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb write table: {e}")))?;
            entries
                .insert(
                    (entry.environment.0.as_str(), entry.key.0.as_str()),
                    entry_bytes.as_slice(),
                )
                .map_err(|e| DomainError::StoreFailed(format!("redb insert: {e}")))?;

            let mut history = txn
                .open_table(HISTORY_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb write table: {e}")))?;
            history
                .insert(
                    (
                        entry.environment.0.as_str(),
                        entry.key.0.as_str(),
                        change.version,
                    ),
                    change_bytes.as_slice(),
                )
                .map_err(|e| DomainError::StoreFailed(format!("redb insert: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::StoreFailed(format!("redb write commit: {e}")))?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<(ConfigEntry, Vec<ConfigChange>)>, DomainError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| DomainError::StoreFailed(format!("redb read txn: {e}")))?;
        let entries_table = txn
            .open_table(ENTRIES_TABLE)
            .map_err(|e| DomainError::StoreFailed(format!("redb read table: {e}")))?;
        let history_table = txn
            .open_table(HISTORY_TABLE)
            .map_err(|e| DomainError::StoreFailed(format!("redb read table: {e}")))?;

        let mut history: BTreeMap<(String, String), Vec<ConfigChange>> = BTreeMap::new();
        let iter = history_table
            .iter()
            .map_err(|e| DomainError::StoreFailed(format!("redb iter: {e}")))?;
        for row in iter {
            let (key, value) =
                row.map_err(|e| DomainError::StoreFailed(format!("redb iter row: {e}")))?;
            let (env, config_key, _version) = key.value();
            let change: ConfigChange = serde_json::from_slice(value.value())
                .map_err(|e| DomainError::StoreFailed(format!("deserialize change: {e}")))?;
            history
                .entry((env.to_string(), config_key.to_string()))
                .or_default()
                .push(change);
        }

        let mut result = Vec::new();
        let iter = entries_table
            .iter()
            .map_err(|e| DomainError::StoreFailed(format!("redb iter: {e}")))?;
        for row in iter {
            let (key, value) =
                row.map_err(|e| DomainError::StoreFailed(format!("redb iter row: {e}")))?;
            let (env, config_key) = key.value();
            let entry: ConfigEntry = serde_json::from_slice(value.value())
                .map_err(|e| DomainError::StoreFailed(format!("deserialize entry: {e}")))?;
            let changes = history
                .remove(&(env.to_string(), config_key.to_string()))
                .unwrap_or_default();
            result.push((entry, changes));
        }
        Ok(result)
    }
}
