use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::common::entity::EntityKind;

/// Identifies one logical change stream: `(entity kind, key)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub kind: EntityKind,
    pub key: String,
}

impl StreamKey {
    pub fn new(kind: EntityKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

/// One change notification. Consumers receive at-least-once delivery and
/// dedupe on `(kind, key, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub key: String,
    pub version: u64,
    /// Event payload for subscribers. Secret events carry metadata only,
    /// never plaintext.
    pub payload: String,
    pub occurred_at_ms: u64,
}

impl ChangeEvent {
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(self.kind, self.key.clone())
    }
}

/// Bounded per-stream replay buffer.
///
/// Holds the most recent events for one stream in version order so that
/// reconnecting subscribers can resync from `since_version`. Oldest
/// events are trimmed once the capacity is reached; a subscriber whose
/// acknowledged version has aged out simply receives the earliest
/// retained event onward (at-least-once, never out of order).
#[derive(Debug)]
pub struct ReplayBuffer {
    capacity: usize,
    events: VecDeque<ChangeEvent>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::new(),
        }
    }

    /// Append an event, trimming the oldest beyond capacity.
    pub fn push(&mut self, event: ChangeEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Events with `version > since_version`, in order.
    pub fn since(&self, since_version: u64) -> Vec<ChangeEvent> {
        self.events
            .iter()
            .filter(|e| e.version > since_version)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn latest_version(&self) -> Option<u64> {
        self.events.back().map(|e| e.version)
    }
}
