use crate::common::entity::EntityKind;

use super::entity::{ChangeOp, ChangeRecord};

/// Filter parameters for querying the change audit trail.
#[derive(Debug, Clone, Default)]
pub struct ChangeQuery {
    /// Start of time range (inclusive, milliseconds since epoch).
    pub from_ms: Option<u64>,
    /// End of time range (inclusive, milliseconds since epoch).
    pub to_ms: Option<u64>,
    /// Filter by entity kind.
    pub kind: Option<EntityKind>,
    /// Filter by change operation.
    pub op: Option<ChangeOp>,
    /// Filter by entity key (exact match).
    pub entity_key: Option<String>,
    /// Maximum number of records to return.
    pub limit: usize,
    /// Number of records to skip.
    pub offset: usize,
}

impl ChangeQuery {
    /// Check whether a `ChangeRecord` matches all active filters.
    pub fn matches(&self, record: &ChangeRecord) -> bool {
        if self.from_ms.is_some_and(|from| record.timestamp_ms < from) {
            return false;
        }
        if self.to_ms.is_some_and(|to| record.timestamp_ms > to) {
            return false;
        }
        if self.kind.is_some_and(|kind| record.kind != kind) {
            return false;
        }
        if self.op.is_some_and(|op| record.op != op) {
            return false;
        }
        if self
            .entity_key
            .as_ref()
            .is_some_and(|key| record.entity_key != *key)
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entity::ChangeActor;

    fn make_record(kind: EntityKind, op: ChangeOp, ts: u64) -> ChangeRecord {
        ChangeRecord {
            kind,
            entity_key: "db.timeout".to_string(),
            version: 1,
            timestamp_ms: ts,
            op,
            actor: ChangeActor::Api,
            principal: "tester".to_string(),
            before: None,
            after: None,
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = ChangeQuery::default();
        assert!(q.matches(&make_record(EntityKind::Config, ChangeOp::Created, 1000)));
    }

    #[test]
    fn time_range_filters() {
        let q = ChangeQuery {
            from_ms: Some(500),
            to_ms: Some(1500),
            ..Default::default()
        };
        assert!(!q.matches(&make_record(EntityKind::Config, ChangeOp::Created, 100)));
        assert!(q.matches(&make_record(EntityKind::Config, ChangeOp::Created, 1000)));
        assert!(!q.matches(&make_record(EntityKind::Config, ChangeOp::Created, 2000)));
    }

    #[test]
    fn kind_filters() {
        let q = ChangeQuery {
            kind: Some(EntityKind::Secret),
            ..Default::default()
        };
        assert!(!q.matches(&make_record(EntityKind::Config, ChangeOp::Created, 1000)));
        assert!(q.matches(&make_record(EntityKind::Secret, ChangeOp::Created, 1000)));
    }

    #[test]
    fn op_filters() {
        let q = ChangeQuery {
            op: Some(ChangeOp::Rotated),
            ..Default::default()
        };
        assert!(!q.matches(&make_record(EntityKind::Secret, ChangeOp::Created, 1000)));
        assert!(q.matches(&make_record(EntityKind::Secret, ChangeOp::Rotated, 1000)));
    }

    #[test]
    fn entity_key_filters() {
        let q = ChangeQuery {
            entity_key: Some("other.key".to_string()),
            ..Default::default()
        };
        assert!(!q.matches(&make_record(EntityKind::Config, ChangeOp::Created, 1000)));
    }
}
