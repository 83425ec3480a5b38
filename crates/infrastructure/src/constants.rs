use std::time::Duration;

// ── Network defaults ───────────────────────────────────────────────

pub const DEFAULT_CONFIG_PATH: &str = "/etc/steward/config.yaml";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_METRICS_PORT: u16 = 9090;

// ── Storage defaults ───────────────────────────────────────────────

pub const DEFAULT_DATA_DIR: &str = "/var/lib/steward";
pub const DEFAULT_MASTER_KEY_PATH: &str = "/etc/steward/master.key";

// ── Channel capacities ─────────────────────────────────────────────

pub const PROPAGATOR_QUEUE_CAPACITY: usize = 1_024;
pub const REPLAY_BUFFER_CAPACITY: usize = 256;
pub const SUBSCRIBER_BUFFER_CAPACITY: usize = 64;

// ── Timeouts and intervals ─────────────────────────────────────────

pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SECRET_READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ROTATION_TICK: Duration = Duration::from_secs(30);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_are_distinct() {
        assert_ne!(DEFAULT_HTTP_PORT, DEFAULT_METRICS_PORT);
    }

    #[test]
    fn shutdown_timeout_is_bounded() {
        assert!(GRACEFUL_SHUTDOWN_TIMEOUT <= Duration::from_secs(30));
    }
}
