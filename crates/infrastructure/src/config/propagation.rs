//! Change propagator tuning.

use serde::{Deserialize, Serialize};

use super::common::ConfigError;
use crate::constants::{
    PROPAGATOR_QUEUE_CAPACITY, REPLAY_BUFFER_CAPACITY, SUBSCRIBER_BUFFER_CAPACITY,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Capacity of the internal publish queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Events retained per stream for reconnect replay.
    #[serde(default = "default_replay_capacity")]
    pub replay_capacity: usize,

    /// Per-subscriber buffer; a subscriber this far behind is dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_queue_capacity() -> usize {
    PROPAGATOR_QUEUE_CAPACITY
}

fn default_replay_capacity() -> usize {
    REPLAY_BUFFER_CAPACITY
}

fn default_subscriber_buffer() -> usize {
    SUBSCRIBER_BUFFER_CAPACITY
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            replay_capacity: default_replay_capacity(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

impl PropagationConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("propagation.queue_capacity", self.queue_capacity),
            ("propagation.replay_capacity", self.replay_capacity),
            ("propagation.subscriber_buffer", self.subscriber_buffer),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: "must be > 0".to_string(),
                });
            }
        }
        Ok(())
    }
}
