use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use domain::common::error::DomainError;
use domain::secrets::entity::SecretAccessRecord;
use domain::secrets::query::AccessLogQuery;
use ports::secondary::access_log_store::AccessLogStore;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

/// redb table: key = `(accessed_at_ms, sequence)` to guarantee
/// uniqueness, value = JSON-serialized `SecretAccessRecord`.
const ACCESS_LOG_TABLE: TableDefinition<(u64, u64), &[u8]> =
    TableDefinition::new("secret_access_log");

/// Persistent secret access log backed by redb.
///
/// Stores records keyed by `(accessed_at_ms, seq)` so records with
/// identical timestamps stay unique. Append-only apart from bounded
/// eviction: oldest records are removed once `max_entries` is exceeded.
/// A failed write here fails the owning secret read closed.
pub struct RedbAccessLogStore {
    db: Database,
    max_entries: usize,
    seq: AtomicU64,
    /// Serialize writes so eviction + insert is atomic.
    write_lock: Mutex<()>,
}

impl RedbAccessLogStore {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path, max_entries: usize) -> Result<Self, DomainError> {
        let db = Database::create(path)
            .map_err(|e| DomainError::AuditFailed(format!("redb open failed: {e}")))?;

        let txn = db
            .begin_write()
            .map_err(|e| DomainError::AuditFailed(format!("redb txn begin: {e}")))?;
        {
            let _table = txn
                .open_table(ACCESS_LOG_TABLE)
                .map_err(|e| DomainError::AuditFailed(format!("redb table create: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::AuditFailed(format!("redb commit: {e}")))?;

        Ok(Self {
            db,
            max_entries,
            seq: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        })
    }

    /// Evict oldest records if the store exceeds `max_entries`.
    fn evict_if_needed(&self) -> Result<(), DomainError> {
        let count = self.record_count()?;
        if count <= self.max_entries {
            return Ok(());
        }
        let to_remove = count - self.max_entries;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| DomainError::AuditFailed(format!("redb evict txn: {e}")))?;
        {
            let mut table = txn
                .open_table(ACCESS_LOG_TABLE)
                .map_err(|e| DomainError::AuditFailed(format!("redb evict table: {e}")))?;

            let keys: Vec<(u64, u64)> = table
                .iter()
                .map_err(|e| DomainError::AuditFailed(format!("redb iter: {e}")))?
                .filter_map(Result::ok)
                .take(to_remove)
                .map(|(k, _v)| k.value())
                .collect();

            for key in keys {
                let _ = table.remove(key);
            }
        }
        txn.commit()
            .map_err(|e| DomainError::AuditFailed(format!("redb evict commit: {e}")))?;

        Ok(())
    }
}

impl AccessLogStore for RedbAccessLogStore {
    fn store_record(&self, record: &SecretAccessRecord) -> Result<(), DomainError> {
        let _lock = self
            .write_lock
            .lock()
            .map_err(|e| DomainError::AuditFailed(format!("lock poisoned: {e}")))?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = (record.accessed_at_ms, seq);
        let value = serde_json::to_vec(record)
            .map_err(|e| DomainError::AuditFailed(format!("serialize: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| DomainError::AuditFailed(format!("redb write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(ACCESS_LOG_TABLE)
                .map_err(|e| DomainError::AuditFailed(format!("redb write table: {e}")))?;
            table
                .insert(key, value.as_slice())
                .map_err(|e| DomainError::AuditFailed(format!("redb insert: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::AuditFailed(format!("redb write commit: {e}")))?;

        self.evict_if_needed()?;

        Ok(())
    }

    fn query_records(&self, query: &AccessLogQuery) -> Result<Vec<SecretAccessRecord>, DomainError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| DomainError::AuditFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(ACCESS_LOG_TABLE)
            .map_err(|e| DomainError::AuditFailed(format!("redb read table: {e}")))?;

        let iter = table
            .iter()
            .map_err(|e| DomainError::AuditFailed(format!("redb iter: {e}")))?;

        let records: Vec<SecretAccessRecord> = iter
            .filter_map(Result::ok)
            .filter_map(|(_k, v): (_, redb::AccessGuard<'_, &[u8]>)| {
                serde_json::from_slice::<SecretAccessRecord>(v.value()).ok()
            })
            .filter(|r| query.matches(r))
            .collect();

        // Reverse for newest-first, then apply offset/limit.
        let total = records.len();
        let start = query.offset.min(total);
        let limit = if query.limit == 0 { total } else { query.limit };
        let end = (start + limit).min(total);

        let mut result: Vec<SecretAccessRecord> = records.into_iter().rev().collect();
        Ok(result.drain(start..end).collect())
    }

    fn cleanup_expired(&self, before_ms: u64) -> Result<usize, DomainError> {
        let _lock = self
            .write_lock
            .lock()
            .map_err(|e| DomainError::AuditFailed(format!("lock poisoned: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| DomainError::AuditFailed(format!("redb cleanup txn: {e}")))?;
        let removed;
        {
            let mut table = txn
                .open_table(ACCESS_LOG_TABLE)
                .map_err(|e| DomainError::AuditFailed(format!("redb cleanup table: {e}")))?;

            let keys: Vec<(u64, u64)> = table
                .iter()
                .map_err(|e| DomainError::AuditFailed(format!("redb iter: {e}")))?
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
            .map_err(|e| DomainError::AuditFailed(format!("redb cleanup commit: {e}")))?;

        Ok(removed)
    }

    fn record_count(&self) -> Result<usize, DomainError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| DomainError::AuditFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(ACCESS_LOG_TABLE)
            .map_err(|e| DomainError::AuditFailed(format!("redb read table: {e}")))?;
        Ok(table
            .len()
            .map_err(|e| DomainError::AuditFailed(format!("redb len: {e}")))? as usize)
    }
}
