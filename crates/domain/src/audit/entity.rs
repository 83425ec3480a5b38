use serde::{Deserialize, Serialize};

use crate::common::entity::EntityKind;

/// Identifies who initiated a control-plane mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeActor {
    /// Change made via the REST API.
    Api,
    /// Change made by the rotation scheduler.
    Scheduler,
    /// Change made via the CLI.
    Cli,
}

impl ChangeActor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Scheduler => "scheduler",
            Self::Cli => "cli",
        }
    }
}

impl std::fmt::Display for ChangeActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type of mutation recorded in the change audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
    Rotated,
    Revoked,
}

impl ChangeOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Rotated => "rotated",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record of one control-plane mutation (config write, secret rotation,
/// policy update).
///
/// Before/after snapshots are stored as JSON strings to avoid coupling the
/// audit trail to specific entity types. Secret snapshots carry only
/// metadata, never plaintext or ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Which entity kind was mutated.
    pub kind: EntityKind,
    /// The entity key (config key, secret name, or policy id).
    pub entity_key: String,
    /// Entity version after the mutation.
    pub version: u64,
    /// Wall-clock timestamp in milliseconds since UNIX epoch.
    pub timestamp_ms: u64,
    /// The type of change.
    pub op: ChangeOp,
    /// Who initiated the change.
    pub actor: ChangeActor,
    /// Principal name from the caller's credentials.
    pub principal: String,
    /// JSON snapshot before the change (None for creates).
    pub before: Option<String>,
    /// JSON snapshot after the change (None for deletes).
    pub after: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_actor_display() {
        assert_eq!(ChangeActor::Api.as_str(), "api");
        assert_eq!(ChangeActor::Scheduler.as_str(), "scheduler");
        assert_eq!(ChangeActor::Cli.to_string(), "cli");
    }

    #[test]
    fn change_op_display() {
        assert_eq!(ChangeOp::Created.as_str(), "created");
        assert_eq!(ChangeOp::Rotated.to_string(), "rotated");
    }

    #[test]
    fn record_round_trips_through_serde() {
        let record = ChangeRecord {
            kind: EntityKind::Config,
            entity_key: "db.timeout".to_string(),
            version: 2,
            timestamp_ms: 1_700_000_000_000,
            op: ChangeOp::Updated,
            actor: ChangeActor::Api,
            principal: "deploy-bot".to_string(),
            before: Some(r#"{"value":"30"}"#.to_string()),
            after: Some(r#"{"value":"60"}"#.to_string()),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ChangeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entity_key, "db.timeout");
        assert_eq!(back.version, 2);
        assert_eq!(back.op, ChangeOp::Updated);
    }
}
