use std::sync::Arc;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use domain::common::error::DomainError;
use domain::secrets::entity::EncryptedBlob;
use ports::secondary::key_provider::KeyProvider;
use ports::secondary::secret_cipher::SecretCipher;
use rand::RngCore;
use rand::rngs::OsRng;

const DATA_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const ALGORITHM: &str = "aes-256-gcm";

/// Envelope cipher: AES-256-GCM under a fresh random data key per
/// encryption, with the data key wrapped by the `KeyProvider`'s master
/// key. Compromise of one stored blob exposes neither the master key
/// nor any other secret's data key.
pub struct EnvelopeCipher {
    key_provider: Arc<dyn KeyProvider>,
}

impl EnvelopeCipher {
    pub fn new(key_provider: Arc<dyn KeyProvider>) -> Self {
        Self { key_provider }
    }
}

impl SecretCipher for EnvelopeCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, DomainError> {
        let mut data_key = [0u8; DATA_KEY_LEN];
        OsRng.fill_bytes(&mut data_key);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&data_key)
            .map_err(|_| DomainError::EncryptionFailed("invalid data key length".to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| DomainError::EncryptionFailed("payload encryption failed".to_string()))?;

        let wrapped_data_key = self.key_provider.wrap_data_key(&data_key)?;

        Ok(EncryptedBlob {
            ciphertext,
            nonce: nonce_bytes.to_vec(),
            wrapped_data_key,
            algorithm: ALGORITHM.to_string(),
        })
    }

    fn decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>, DomainError> {
        if blob.algorithm != ALGORITHM {
            return Err(DomainError::EncryptionFailed(format!(
                "unsupported algorithm '{}'",
                blob.algorithm
            )));
        }
        if blob.nonce.len() != NONCE_LEN {
            return Err(DomainError::EncryptionFailed(
                "invalid nonce length".to_string(),
            ));
        }

        let data_key = self.key_provider.unwrap_data_key(&blob.wrapped_data_key)?;
        let cipher = Aes256Gcm::new_from_slice(&data_key)
            .map_err(|_| DomainError::EncryptionFailed("invalid data key length".to_string()))?;
        let nonce = Nonce::from_slice(&blob.nonce);
        cipher
            .decrypt(nonce, blob.ciphertext.as_ref())
            .map_err(|_| DomainError::EncryptionFailed("payload decryption failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::local_key_provider::LocalKeyProvider;

    fn make_cipher(dir: &tempfile::TempDir) -> EnvelopeCipher {
        let provider = LocalKeyProvider::open(&dir.path().join("master.key")).unwrap();
        EnvelopeCipher::new(Arc::new(provider))
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = make_cipher(&dir);
        let blob = cipher.encrypt(b"hunter2").unwrap();
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"hunter2");
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = make_cipher(&dir);
        let blob = cipher.encrypt(b"hunter2").unwrap();
        assert_ne!(blob.ciphertext, b"hunter2");
        assert_eq!(blob.algorithm, "aes-256-gcm");
    }

    #[test]
    fn each_encryption_uses_fresh_key_and_nonce() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = make_cipher(&dir);
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.wrapped_data_key, b.wrapped_data_key);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = make_cipher(&dir);
        let mut blob = cipher.encrypt(b"hunter2").unwrap();
        blob.ciphertext[0] ^= 0xFF;
        assert!(cipher.decrypt(&blob).is_err());
    }

    #[test]
    fn unknown_algorithm_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cipher = make_cipher(&dir);
        let mut blob = cipher.encrypt(b"hunter2").unwrap();
        blob.algorithm = "rot13".to_string();
        assert!(cipher.decrypt(&blob).is_err());
    }

    #[test]
    fn blob_from_other_master_key_fails() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let blob = make_cipher(&dir_a).encrypt(b"hunter2").unwrap();
        assert!(make_cipher(&dir_b).decrypt(&blob).is_err());
    }
}
