use std::path::Path;

use domain::common::error::DomainError;
use domain::policy::entity::Policy;
use ports::secondary::policy_store::PolicyStore;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

/// redb table: key = `(policy_id, version)`, value = JSON-serialized
/// `Policy`. Append-only: versions are never rewritten or removed, so
/// pinned evaluation always finds its snapshot after a restart.
const POLICIES_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("policy_versions");

/// Persistent policy version store backed by redb.
pub struct RedbPolicyStore {
    db: Database,
}

impl RedbPolicyStore {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path) -> Result<Self, DomainError> {
        let db = Database::create(path)
            .map_err(|e| DomainError::StoreFailed(format!("redb open failed: {e}")))?;

        let txn = db
            .begin_write()
            .map_err(|e| DomainError::StoreFailed(format!("redb txn begin: {e}")))?;
        {
            let _table = txn
                .open_table(POLICIES_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb table create: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::StoreFailed(format!("redb commit: {e}")))?;

        Ok(Self { db })
    }
}

impl PolicyStore for RedbPolicyStore {
    fn persist_version(&self, policy: &Policy) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec(policy)
            .map_err(|e| DomainError::StoreFailed(format!("serialize policy: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| DomainError::StoreFailed(format!("redb write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(POLICIES_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb write table: {e}")))?;
            table
                .insert((policy.id.0.as_str(), policy.version), bytes.as_slice())
                .map_err(|e| DomainError::StoreFailed(format!("redb insert: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::StoreFailed(format!("redb write commit: {e}")))?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Policy>, DomainError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| DomainError::StoreFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(POLICIES_TABLE)
            .map_err(|e| DomainError::StoreFailed(format!("redb read table: {e}")))?;

        let mut policies = Vec::new();
        let iter = table
            .iter()
            .map_err(|e| DomainError::StoreFailed(format!("redb iter: {e}")))?;
        for row in iter {
            let (_key, value) =
                row.map_err(|e| DomainError::StoreFailed(format!("redb iter row: {e}")))?;
            let policy: Policy = serde_json::from_slice(value.value())
                .map_err(|e| DomainError::StoreFailed(format!("deserialize policy: {e}")))?;
            policies.push(policy);
        }
        Ok(policies)
    }
}
