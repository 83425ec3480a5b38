use serde::{Deserialize, Serialize};

use super::error::SecretsError;

/// Maximum length of a secret name.
pub const MAX_NAME_LENGTH: usize = 128;

/// Name of a secret, unique across the vault.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SecretName(pub String);

impl SecretName {
    pub fn validate(&self) -> Result<(), SecretsError> {
        if self.0.is_empty() {
            return Err(SecretsError::InvalidName("name must not be empty".to_string()));
        }
        if self.0.len() > MAX_NAME_LENGTH {
            return Err(SecretsError::InvalidName(format!(
                "name exceeds {MAX_NAME_LENGTH} characters"
            )));
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
        {
            return Err(SecretsError::InvalidName(format!(
                "name '{}' contains invalid characters",
                self.0
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for SecretName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of one secret version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretStatus {
    /// Current version, returned by default reads.
    Active,
    /// Superseded by a rotation; still valid until its grace expiry.
    Deprecated,
    /// No longer valid; reads fail.
    Revoked,
}

impl SecretStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for SecretStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope-encrypted payload: the plaintext is sealed with a fresh data
/// key, and the data key is wrapped by the master key behind the
/// `KeyProvider` port. Plaintext never appears in this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub wrapped_data_key: Vec<u8>,
    /// Cipher identifier, e.g. `aes-256-gcm`.
    pub algorithm: String,
}

/// One version of a secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretVersion {
    pub version: u64,
    pub status: SecretStatus,
    pub created_at_ms: u64,
    /// Set when the version is deprecated; once passed, the sweep flips
    /// the version to Revoked.
    pub deprecated_expires_at_ms: Option<u64>,
    pub blob: EncryptedBlob,
}

/// A named secret and its full version chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    pub name: SecretName,
    pub versions: Vec<SecretVersion>,
    /// Total successful reads across all versions.
    pub access_count: u64,
    pub created_at_ms: u64,
}

impl Secret {
    /// The current Active version, if any.
    pub fn active_version(&self) -> Option<&SecretVersion> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.status == SecretStatus::Active)
    }

    pub fn version(&self, version: u64) -> Option<&SecretVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    pub fn latest_version_number(&self) -> u64 {
        self.versions.last().map_or(0, |v| v.version)
    }
}

/// Append-only record of a secret access attempt. Written synchronously
/// before any plaintext is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretAccessRecord {
    pub secret_name: String,
    pub version: u64,
    pub accessed_by: String,
    pub accessed_at_ms: u64,
    pub success: bool,
}
