use domain::common::error::DomainError;
use domain::secrets::entity::EncryptedBlob;

/// Secondary port for envelope encryption of secret payloads.
///
/// `encrypt` seals plaintext under a fresh data key and returns the blob
/// with that data key wrapped by the `KeyProvider`; `decrypt` reverses
/// both layers. Implemented by `EnvelopeCipher` in the adapter layer.
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, DomainError>;

    fn decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>, DomainError>;
}
