use domain::audit::entity::ChangeRecord;
use domain::audit::error::AuditError;
use domain::audit::query::ChangeQuery;

/// Secondary port for the mutation audit trail (who changed what, with
/// before/after snapshots).
///
/// Unlike the secret access log, writes here are best-effort: a failed
/// audit write is logged but never fails the originating mutation, which
/// has already been applied and propagated.
pub trait ChangeLogStore: Send + Sync {
    /// Persist a single change record.
    fn store_record(&self, record: &ChangeRecord) -> Result<(), AuditError>;

    /// Query stored records matching the given filters, newest first.
    fn query_records(&self, query: &ChangeQuery) -> Result<Vec<ChangeRecord>, AuditError>;

    /// Remove records older than `before_ms`. Returns the number removed.
    fn cleanup_expired(&self, before_ms: u64) -> Result<usize, AuditError>;

    /// Total number of stored records.
    fn record_count(&self) -> Result<usize, AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_log_store_is_object_safe() {
        fn _check(store: &dyn ChangeLogStore) {
            let _ = store.record_count();
        }
    }
}
