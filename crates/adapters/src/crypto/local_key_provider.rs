use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use domain::common::error::DomainError;
use infrastructure::config::warn_if_world_readable;
use ports::secondary::key_provider::KeyProvider;
use rand::RngCore;
use rand::rngs::OsRng;

const MASTER_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// `KeyProvider` backed by a local master-key file.
///
/// The master key is 32 raw bytes, created with restrictive permissions
/// on first use. Data keys are wrapped with AES-256-GCM under the master
/// key; the wrapped form is `nonce || ciphertext`. An external KMS
/// replaces this adapter behind the same port.
pub struct LocalKeyProvider {
    key_path: PathBuf,
    cipher: Aes256Gcm,
}

impl LocalKeyProvider {
    /// Load the master key from `path`, creating it if absent.
    pub fn open(path: &Path) -> Result<Self, DomainError> {
        let key = Self::load_or_create_master_key(path)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| DomainError::EncryptionFailed("invalid master key length".to_string()))?;
        Ok(Self {
            key_path: path.to_path_buf(),
            cipher,
        })
    }

    fn load_or_create_master_key(path: &Path) -> Result<[u8; MASTER_KEY_LEN], DomainError> {
        if path.exists() {
            warn_if_world_readable(path, "master key file");
            let bytes = std::fs::read(path)
                .map_err(|e| DomainError::EncryptionFailed(format!("master key read: {e}")))?;
            let key: [u8; MASTER_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
                DomainError::EncryptionFailed(format!(
                    "master key must be exactly {MASTER_KEY_LEN} bytes, found {}",
                    bytes.len()
                ))
            })?;
            return Ok(key);
        }

        let mut key = [0u8; MASTER_KEY_LEN];
        OsRng.fill_bytes(&mut key);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DomainError::EncryptionFailed(format!("key dir create: {e}")))?;
        }
        write_restricted(path, &key)?;
        tracing::info!(path = %path.display(), "generated new master key");
        Ok(key)
    }
}

/// Write a key file with owner-only permissions.
fn write_restricted(path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    std::fs::write(path, bytes)
        .map_err(|e| DomainError::EncryptionFailed(format!("master key write: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| DomainError::EncryptionFailed(format!("master key chmod: {e}")))?;
    }
    Ok(())
}

impl KeyProvider for LocalKeyProvider {
    fn wrap_data_key(&self, data_key: &[u8]) -> Result<Vec<u8>, DomainError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, data_key)
            .map_err(|_| DomainError::EncryptionFailed("data key wrap failed".to_string()))?;

        let mut wrapped = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        wrapped.extend_from_slice(&nonce_bytes);
        wrapped.extend_from_slice(&ciphertext);
        Ok(wrapped)
    }

    fn unwrap_data_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, DomainError> {
        if wrapped.len() <= NONCE_LEN {
            return Err(DomainError::EncryptionFailed(
                "wrapped data key too short".to_string(),
            ));
        }
        let (nonce_bytes, ciphertext) = wrapped.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| DomainError::EncryptionFailed("data key unwrap failed".to_string()))
    }

    fn key_id(&self) -> String {
        format!("local:{}", self.key_path.display())
    }
}
