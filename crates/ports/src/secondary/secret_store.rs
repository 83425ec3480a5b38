use domain::common::error::DomainError;
use domain::rotation::entity::RotationPolicy;
use domain::secrets::entity::Secret;

/// Secondary port for persisting encrypted secrets and their rotation
/// policies.
///
/// Secrets are stored whole (name plus full version chain of encrypted
/// blobs); plaintext never crosses this interface.
pub trait SecretStore: Send + Sync {
    /// Persist a secret's current state (all versions).
    fn persist_secret(&self, secret: &Secret) -> Result<(), DomainError>;

    /// Load every secret, for vault hydration.
    fn load_secrets(&self) -> Result<Vec<Secret>, DomainError>;

    /// Persist a rotation policy's current state.
    fn persist_policy(&self, policy: &RotationPolicy) -> Result<(), DomainError>;

    /// Remove a rotation policy.
    fn remove_policy(&self, secret_name: &str) -> Result<(), DomainError>;

    /// Load every rotation policy, for scheduler hydration.
    fn load_policies(&self) -> Result<Vec<RotationPolicy>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_store_is_object_safe() {
        fn _check(store: &dyn SecretStore) {
            let _ = store.load_secrets();
        }
    }
}
