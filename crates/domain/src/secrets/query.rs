use super::entity::SecretAccessRecord;

/// Filter parameters for querying the secret access log.
#[derive(Debug, Clone, Default)]
pub struct AccessLogQuery {
    /// Start of time range (inclusive, milliseconds since epoch).
    pub from_ms: Option<u64>,
    /// End of time range (inclusive, milliseconds since epoch).
    pub to_ms: Option<u64>,
    /// Filter by secret name (exact match).
    pub secret_name: Option<String>,
    /// Filter by accessing principal (exact match).
    pub accessed_by: Option<String>,
    /// Only failed or only successful accesses.
    pub success: Option<bool>,
    /// Maximum number of records to return.
    pub limit: usize,
    /// Number of records to skip.
    pub offset: usize,
}

impl AccessLogQuery {
    /// Check whether an access record matches all active filters.
    pub fn matches(&self, record: &SecretAccessRecord) -> bool {
        if self.from_ms.is_some_and(|from| record.accessed_at_ms < from) {
            return false;
        }
        if self.to_ms.is_some_and(|to| record.accessed_at_ms > to) {
            return false;
        }
        if self
            .secret_name
            .as_ref()
            .is_some_and(|name| record.secret_name != *name)
        {
            return false;
        }
        if self
            .accessed_by
            .as_ref()
            .is_some_and(|by| record.accessed_by != *by)
        {
            return false;
        }
        if self.success.is_some_and(|s| record.success != s) {
            return false;
        }
        true
    }
}
