//! Shared parsing helpers and error types used across all config modules.

use std::path::Path;

use tracing::warn;

// ── Security limits ────────────────────────────────────────────────
//
// Maximum counts per section to prevent OOM from excessive config.

/// Maximum rate limit rules.
pub(super) const MAX_RATELIMIT_RULES: usize = 10_000;
/// Maximum rotation policies.
pub(super) const MAX_ROTATION_POLICIES: usize = 10_000;

// ── Config errors ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid value '{value}' for field '{field}': expected one of {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn check_limit(section: &str, len: usize, max: usize) -> Result<(), ConfigError> {
    if len > max {
        return Err(ConfigError::Validation {
            field: section.to_string(),
            message: format!("{len} entries exceeds the maximum of {max}"),
        });
    }
    Ok(())
}

/// Warn if a sensitive file is readable by group or others.
///
/// Config and key files may contain secrets; anything more permissive
/// than 0o640 is flagged. Permission bits only exist on Unix.
pub fn warn_if_world_readable(path: &Path, description: &str) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.permissions().mode() & 0o777;
            if mode & 0o037 != 0 {
                warn!(
                    path = %path.display(),
                    mode = format!("{mode:o}"),
                    "{description} is readable by group/other; consider chmod 640 or stricter"
                );
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, description);
    }
}
