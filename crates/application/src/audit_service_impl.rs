use std::sync::Arc;

use domain::audit::entity::{ChangeActor, ChangeOp, ChangeRecord};
use domain::audit::query::ChangeQuery;
use domain::common::entity::EntityKind;
use domain::common::error::DomainError;
use ports::secondary::change_log_store::ChangeLogStore;

use crate::clock::now_ms;

/// Application-level mutation audit service.
///
/// Records who changed which config entry, secret, or policy, with
/// before/after snapshots. Writes are best-effort: the mutation has
/// already been applied, so a failed audit write is logged and swallowed.
pub struct AuditAppService {
    store: Arc<dyn ChangeLogStore>,
}

impl AuditAppService {
    pub fn new(store: Arc<dyn ChangeLogStore>) -> Self {
        Self { store }
    }

    /// Record a control-plane mutation. Never fails the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn record_change(
        &self,
        kind: EntityKind,
        entity_key: &str,
        version: u64,
        op: ChangeOp,
        actor: ChangeActor,
        principal: &str,
        before: Option<String>,
        after: Option<String>,
    ) {
        let record = ChangeRecord {
            kind,
            entity_key: entity_key.to_string(),
            version,
            timestamp_ms: now_ms(),
            op,
            actor,
            principal: principal.to_string(),
            before,
            after,
        };
        if let Err(e) = self.store.store_record(&record) {
            tracing::warn!(
                kind = %kind,
                entity_key,
                error = %e,
                "failed to record change audit entry"
            );
        }
    }

    /// Query the audit trail, newest first.
    pub fn query(&self, query: &ChangeQuery) -> Result<Vec<ChangeRecord>, DomainError> {
        self.store.query_records(query).map_err(Into::into)
    }

    /// Remove records older than `before_ms`. Returns the number removed.
    pub fn cleanup_expired(&self, before_ms: u64) -> Result<usize, DomainError> {
        self.store.cleanup_expired(before_ms).map_err(Into::into)
    }

    pub fn record_count(&self) -> Result<usize, DomainError> {
        self.store.record_count().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ports::test_utils::InMemoryChangeLog;

    fn make_service() -> AuditAppService {
        AuditAppService::new(Arc::new(InMemoryChangeLog::new()))
    }

    #[test]
    fn record_and_query() {
        let svc = make_service();
        svc.record_change(
            EntityKind::Config,
            "db.timeout",
            1,
            ChangeOp::Created,
            ChangeActor::Api,
            "deploy-bot",
            None,
            Some(r#"{"value":"30"}"#.to_string()),
        );

        let records = svc.query(&ChangeQuery::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_key, "db.timeout");
        assert_eq!(records[0].principal, "deploy-bot");
    }

    #[test]
    fn query_filters_by_kind() {
        let svc = make_service();
        svc.record_change(
            EntityKind::Config,
            "k",
            1,
            ChangeOp::Created,
            ChangeActor::Api,
            "a",
            None,
            None,
        );
        svc.record_change(
            EntityKind::Secret,
            "s",
            1,
            ChangeOp::Rotated,
            ChangeActor::Scheduler,
            "scheduler",
            None,
            None,
        );

        let query = ChangeQuery {
            kind: Some(EntityKind::Secret),
            ..Default::default()
        };
        let records = svc.query(&query).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].op, ChangeOp::Rotated);
    }

    #[test]
    fn record_count_tracks_writes() {
        let svc = make_service();
        assert_eq!(svc.record_count().unwrap(), 0);
        svc.record_change(
            EntityKind::Policy,
            "p1",
            1,
            ChangeOp::Updated,
            ChangeActor::Cli,
            "ops",
            None,
            None,
        );
        assert_eq!(svc.record_count().unwrap(), 1);
    }
}
