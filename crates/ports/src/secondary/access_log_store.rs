use domain::common::error::DomainError;
use domain::secrets::entity::SecretAccessRecord;
use domain::secrets::query::AccessLogQuery;

/// Secondary port for the append-only secret access log.
///
/// The vault writes a record through this port BEFORE returning any
/// plaintext; a failed write fails the read closed. Results are returned
/// in reverse chronological order (newest first). Implementations may use
/// redb or in-memory storage.
pub trait AccessLogStore: Send + Sync {
    /// Persist a single access record. Errors map to `AuditFailed`.
    fn store_record(&self, record: &SecretAccessRecord) -> Result<(), DomainError>;

    /// Query stored records matching the given filters.
    fn query_records(&self, query: &AccessLogQuery) -> Result<Vec<SecretAccessRecord>, DomainError>;

    /// Remove records older than `before_ms`. Returns the number removed.
    fn cleanup_expired(&self, before_ms: u64) -> Result<usize, DomainError>;

    /// Total number of stored records.
    fn record_count(&self) -> Result<usize, DomainError>;
}
