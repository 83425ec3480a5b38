use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use domain::audit::entity::ChangeRecord;
use domain::audit::error::AuditError;
use domain::audit::query::ChangeQuery;
use ports::secondary::change_log_store::ChangeLogStore;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

/// redb table: key = `(timestamp_ms, sequence)`, value = JSON-serialized
/// `ChangeRecord`.
const CHANGE_LOG_TABLE: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("change_log");

/// Persistent mutation audit trail backed by redb.
///
/// Same layout as the access log: records keyed by `(timestamp_ms, seq)`
/// with bounded oldest-first eviction.
pub struct RedbChangeLogStore {
    db: Database,
    max_entries: usize,
    seq: AtomicU64,
    write_lock: Mutex<()>,
}

impl RedbChangeLogStore {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path, max_entries: usize) -> Result<Self, AuditError> {
        let db = Database::create(path)
            .map_err(|e| AuditError::StoreUnavailable(format!("redb open failed: {e}")))?;

        let txn = db
            .begin_write()
            .map_err(|e| AuditError::StoreUnavailable(format!("redb txn begin: {e}")))?;
        {
            let _table = txn
                .open_table(CHANGE_LOG_TABLE)
                .map_err(|e| AuditError::StoreUnavailable(format!("redb table create: {e}")))?;
        }
        txn.commit()
            .map_err(|e| AuditError::StoreUnavailable(format!("redb commit: {e}")))?;

        Ok(Self {
            db,
            max_entries,
            seq: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        })
    }

    fn evict_if_needed(&self) -> Result<(), AuditError> {
        let count = self.record_count()?;
        if count <= self.max_entries {
            return Ok(());
        }
        let to_remove = count - self.max_entries;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| AuditError::WriteFailed(format!("redb evict txn: {e}")))?;
        {
            let mut table = txn
                .open_table(CHANGE_LOG_TABLE)
                .map_err(|e| AuditError::WriteFailed(format!("redb evict table: {e}")))?;

            let keys: Vec<(u64, u64)> = table
                .iter()
                .map_err(|e| AuditError::WriteFailed(format!("redb iter: {e}")))?
                .filter_map(Result::ok)
                .take(to_remove)
                .map(|(k, _v)| k.value())
                .collect();

            for key in keys {
                let _ = table.remove(key);
            }
        }
        txn.commit()
            .map_err(|e| AuditError::WriteFailed(format!("redb evict commit: {e}")))?;

        Ok(())
    }
}

impl ChangeLogStore for RedbChangeLogStore {
    fn store_record(&self, record: &ChangeRecord) -> Result<(), AuditError> {
        let _lock = self
            .write_lock
            .lock()
            .map_err(|e| AuditError::WriteFailed(format!("lock poisoned: {e}")))?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = (record.timestamp_ms, seq);
        let value =
            serde_json::to_vec(record).map_err(|e| AuditError::WriteFailed(format!("serialize: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| AuditError::WriteFailed(format!("redb write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(CHANGE_LOG_TABLE)
                .map_err(|e| AuditError::WriteFailed(format!("redb write table: {e}")))?;
            table
                .insert(key, value.as_slice())
                .map_err(|e| AuditError::WriteFailed(format!("redb insert: {e}")))?;
        }
        txn.commit()
            .map_err(|e| AuditError::WriteFailed(format!("redb write commit: {e}")))?;

        self.evict_if_needed()?;

        Ok(())
    }

    fn query_records(&self, query: &ChangeQuery) -> Result<Vec<ChangeRecord>, AuditError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| AuditError::QueryFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(CHANGE_LOG_TABLE)
            .map_err(|e| AuditError::QueryFailed(format!("redb read table: {e}")))?;

        let iter = table
            .iter()
            .map_err(|e| AuditError::QueryFailed(format!("redb iter: {e}")))?;

        let records: Vec<ChangeRecord> = iter
            .filter_map(Result::ok)
            .filter_map(|(_k, v): (_, redb::AccessGuard<'_, &[u8]>)| {
                serde_json::from_slice::<ChangeRecord>(v.value()).ok()
            })
            .filter(|r| query.matches(r))
            .collect();

        let total = records.len();
        let start = query.offset.min(total);
        let limit = if query.limit == 0 { total } else { query.limit };
        let end = (start + limit).min(total);

        let mut result: Vec<ChangeRecord> = records.into_iter().rev().collect();
        Ok(result.drain(start..end).collect())
    }

    fn cleanup_expired(&self, before_ms: u64) -> Result<usize, AuditError> {
        let _lock = self
            .write_lock
            .lock()
            .map_err(|e| AuditError::WriteFailed(format!("lock poisoned: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| AuditError::WriteFailed(format!("redb cleanup txn: {e}")))?;
        let removed;
        {
            let mut table = txn
                .open_table(CHANGE_LOG_TABLE)
                .map_err(|e| AuditError::WriteFailed(format!("redb cleanup table: {e}")))?;

            let keys: Vec<(u64, u64)> = table
                .iter()
                .map_err(|e| AuditError::WriteFailed(format!("redb iter: {e}")))?
                .filter_map(Result::ok)
                .map(|(k, _v)| k.value())
                .take_while(|(ts, _)| *ts < before_ms)
                .collect();

            removed = keys.len();
            for key in keys {
                let _ = table.remove(key);
            }
        }
        txn.commit()
            .map_err(|e| AuditError::WriteFailed(format!("redb cleanup commit: {e}")))?;

        Ok(removed)
    }

    fn record_count(&self) -> Result<usize, AuditError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| AuditError::QueryFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(CHANGE_LOG_TABLE)
            .map_err(|e| AuditError::QueryFailed(format!("redb read table: {e}")))?;
        Ok(table
            .len()
            .map_err(|e| AuditError::QueryFailed(format!("redb len: {e}")))? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::audit::entity::{ChangeActor, ChangeOp};
    use domain::common::entity::EntityKind;

    fn make_record(ts: u64, kind: EntityKind, op: ChangeOp) -> ChangeRecord {
        ChangeRecord {
            kind,
            entity_key: "db.timeout".to_string(),
            version: 1,
            timestamp_ms: ts,
            op,
            actor: ChangeActor::Api,
            principal: "tester".to_string(),
            before: None,
            after: Some("{}".to_string()),
        }
    }

    fn open_store(dir: &tempfile::TempDir, max: usize) -> RedbChangeLogStore {
        RedbChangeLogStore::open(&dir.path().join("changes.redb"), max).unwrap()
    }

    #[test]
    fn store_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, 100);
        store
            .store_record(&make_record(1000, EntityKind::Config, ChangeOp::Created))
            .unwrap();
        store
            .store_record(&make_record(2000, EntityKind::Secret, ChangeOp::Rotated))
            .unwrap();

        let all = store.query_records(&ChangeQuery::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].timestamp_ms, 2000);

        let secrets_only = store
            .query_records(&ChangeQuery {
                kind: Some(EntityKind::Secret),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(secrets_only.len(), 1);
        assert_eq!(secrets_only[0].op, ChangeOp::Rotated);
    }

    #[test]
    fn eviction_bounds_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, 2);
        for ts in 1..=4 {
            store
                .store_record(&make_record(ts * 1000, EntityKind::Config, ChangeOp::Updated))
                .unwrap();
        }
        assert_eq!(store.record_count().unwrap(), 2);
    }

    #[test]
    fn cleanup_by_age() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, 100);
        for ts in [1000, 2000, 3000] {
            store
                .store_record(&make_record(ts, EntityKind::Config, ChangeOp::Updated))
                .unwrap();
        }
        assert_eq!(store.cleanup_expired(2001).unwrap(), 2);
        assert_eq!(store.record_count().unwrap(), 1);
    }
}
