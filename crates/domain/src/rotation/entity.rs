use serde::{Deserialize, Serialize};

use super::error::RotationError;

/// Minimum rotation interval.
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Schedule for rotating one secret. One policy per secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationPolicy {
    pub secret_name: String,
    pub interval_secs: u64,
    /// Overlap window during which the previous version still validates.
    pub grace_period_secs: u64,
    pub last_rotated_at_ms: Option<u64>,
    pub next_rotation_at_ms: u64,
}

impl RotationPolicy {
    pub fn validate(&self) -> Result<(), RotationError> {
        if self.secret_name.is_empty() {
            return Err(RotationError::InvalidPolicy(
                "secret name must not be empty".to_string(),
            ));
        }
        if self.interval_secs < MIN_INTERVAL_SECS {
            return Err(RotationError::IntervalTooShort {
                interval_secs: self.interval_secs,
            });
        }
        if self.grace_period_secs >= self.interval_secs {
            return Err(RotationError::InvalidPolicy(format!(
                "grace period ({}s) must be shorter than the interval ({}s)",
                self.grace_period_secs, self.interval_secs
            )));
        }
        Ok(())
    }

    /// Whether this policy is due at `now_ms`.
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_rotation_at_ms
    }

    pub fn grace_period_ms(&self) -> u64 {
        self.grace_period_secs * 1000
    }
}

/// Progress of one rotation run, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationState {
    /// Waiting for `next_rotation_at_ms`.
    Scheduled,
    /// The vault rotate call is in flight.
    Rotating,
    /// New version active; previous version inside its grace window.
    GracePeriod,
    /// Previous version revoked; run finished.
    Completed,
}

impl RotationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Rotating => "rotating",
            Self::GracePeriod => "grace_period",
            Self::Completed => "completed",
        }
    }

    /// The successor state. `Completed` is terminal.
    pub fn next(self) -> Self {
        match self {
            Self::Scheduled => Self::Rotating,
            Self::Rotating => Self::GracePeriod,
            Self::GracePeriod | Self::Completed => Self::Completed,
        }
    }
}

impl std::fmt::Display for RotationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rotation run for one secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationRun {
    pub secret_name: String,
    pub state: RotationState,
    pub started_at_ms: u64,
}

impl RotationRun {
    pub fn new(secret_name: String, now_ms: u64) -> Self {
        Self {
            secret_name,
            state: RotationState::Scheduled,
            started_at_ms: now_ms,
        }
    }

    pub fn advance(&mut self) {
        self.state = self.state.next();
    }
}

/// A coordination lease held by one scheduler instance for one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub name: String,
    pub holder: String,
    pub expires_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_policy(interval: u64, grace: u64) -> RotationPolicy {
        RotationPolicy {
            secret_name: "api-key".to_string(),
            interval_secs: interval,
            grace_period_secs: grace,
            last_rotated_at_ms: None,
            next_rotation_at_ms: 0,
        }
    }

    #[test]
    fn validate_ok() {
        assert!(make_policy(86_400, 3_600).validate().is_ok());
    }

    #[test]
    fn validate_interval_too_short() {
        assert!(make_policy(30, 0).validate().is_err());
    }

    #[test]
    fn validate_grace_must_be_shorter_than_interval() {
        assert!(make_policy(3_600, 3_600).validate().is_err());
        assert!(make_policy(3_600, 7_200).validate().is_err());
    }

    #[test]
    fn validate_empty_name() {
        let mut policy = make_policy(3_600, 60);
        policy.secret_name = String::new();
        assert!(policy.validate().is_err());
    }

    #[test]
    fn due_at_or_after_next_rotation() {
        let mut policy = make_policy(3_600, 60);
        policy.next_rotation_at_ms = 5000;
        assert!(!policy.is_due(4999));
        assert!(policy.is_due(5000));
        assert!(policy.is_due(6000));
    }

    #[test]
    fn state_machine_walks_to_completed() {
        let mut run = RotationRun::new("api-key".to_string(), 0);
        assert_eq!(run.state, RotationState::Scheduled);
        run.advance();
        assert_eq!(run.state, RotationState::Rotating);
        run.advance();
        assert_eq!(run.state, RotationState::GracePeriod);
        run.advance();
        assert_eq!(run.state, RotationState::Completed);
        // Terminal.
        run.advance();
        assert_eq!(run.state, RotationState::Completed);
    }

    #[test]
    fn state_as_str() {
        assert_eq!(RotationState::Scheduled.as_str(), "scheduled");
        assert_eq!(RotationState::GracePeriod.to_string(), "grace_period");
    }
}
