use serde::{Deserialize, Serialize};

use crate::common::entity::RuleId;

use super::error::RateLimitError;

/// What a rule's counters are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// One shared bucket for all callers.
    Global,
    /// Per-user bucket.
    User,
    /// Per-client-IP bucket.
    Ip,
    /// Per-endpoint bucket.
    Endpoint,
}

impl RateLimitScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::User => "user",
            Self::Ip => "ip",
            Self::Endpoint => "endpoint",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "global" => Some(Self::Global),
            "user" => Some(Self::User),
            "ip" => Some(Self::Ip),
            "endpoint" => Some(Self::Endpoint),
            _ => None,
        }
    }
}

impl std::fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limiting algorithm, selected per rule and dispatched by pattern
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAlgorithm {
    /// Token bucket: smooth limiting with burst allowance.
    #[default]
    TokenBucket,
    /// Fixed window: hard counter reset at each window boundary.
    FixedWindow,
    /// Sliding window: weighted blend of the current and previous fixed
    /// windows.
    SlidingWindow,
    /// Leaky bucket: queue depth draining at a constant rate.
    LeakyBucket,
}

impl RateLimitAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TokenBucket => "token_bucket",
            Self::FixedWindow => "fixed_window",
            Self::SlidingWindow => "sliding_window",
            Self::LeakyBucket => "leaky_bucket",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "token_bucket" | "tokenbucket" => Some(Self::TokenBucket),
            "fixed_window" | "fixedwindow" => Some(Self::FixedWindow),
            "sliding_window" | "slidingwindow" => Some(Self::SlidingWindow),
            "leaky_bucket" | "leakybucket" => Some(Self::LeakyBucket),
            _ => None,
        }
    }
}

impl std::fmt::Display for RateLimitAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rate limit rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub id: RuleId,
    pub scope: RateLimitScope,
    pub algorithm: RateLimitAlgorithm,
    /// Requests per window. Must be >= 1.
    pub limit: u64,
    /// Window length in seconds. Must be >= 1.
    pub window_secs: u64,
    /// Maximum tokens for the token bucket. Must be >= 1 when the
    /// algorithm is `TokenBucket`; ignored otherwise.
    pub burst_capacity: u64,
    pub enabled: bool,
}

impl RateLimitRule {
    /// Validate all fields of this rule.
    pub fn validate(&self) -> Result<(), RateLimitError> {
        self.id
            .validate()
            .map_err(|reason| RateLimitError::InvalidRule(reason.to_string()))?;
        if self.limit == 0 {
            return Err(RateLimitError::InvalidLimit);
        }
        if self.window_secs == 0 {
            return Err(RateLimitError::InvalidWindow);
        }
        if self.algorithm == RateLimitAlgorithm::TokenBucket && self.burst_capacity == 0 {
            return Err(RateLimitError::InvalidBurst);
        }
        Ok(())
    }

    /// The shared-store key prefix for this rule and caller identity.
    ///
    /// Window-keyed algorithms append the window start; state-keyed
    /// algorithms use the prefix directly.
    pub fn counter_key(&self, identity: &str) -> String {
        match self.scope {
            RateLimitScope::Global => format!("rl:{}:global", self.id),
            _ => format!("rl:{}:{}:{}", self.id, self.scope, identity),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_secs * 1000
    }
}

/// Outcome of an admission check. A denial is a soft signal, not an
/// error: the caller gets `retry_after_secs` and decides what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: 0,
        }
    }

    pub fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs: retry_after_secs.max(1),
        }
    }
}
