use domain::common::error::DomainError;

/// Secondary port for the master-key operations of envelope encryption.
///
/// The vault generates a fresh data key per secret version; this port
/// wraps (encrypts) and unwraps (decrypts) that data key under a master
/// key it never exposes. The shipped adapter is a local master-key file;
/// an external KMS implements the same two methods. Failures surface as
/// `EncryptionFailed` and the calling operation fails closed.
pub trait KeyProvider: Send + Sync {
    /// Encrypt a data key under the master key.
    fn wrap_data_key(&self, data_key: &[u8]) -> Result<Vec<u8>, DomainError>;

    /// Decrypt a wrapped data key.
    fn unwrap_data_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, DomainError>;

    /// Stable identifier of the master key in use, for logging.
    fn key_id(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_provider_is_object_safe() {
        fn _check(provider: &dyn KeyProvider) {
            let _ = provider.key_id();
        }
    }
}
