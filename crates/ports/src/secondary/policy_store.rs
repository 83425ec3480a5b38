use domain::common::error::DomainError;
use domain::policy::entity::Policy;

/// Secondary port for persisting policy versions.
///
/// Every version is retained so evaluation can pin historical snapshots;
/// `persist_version` is append-only per `(policy id, version)`.
pub trait PolicyStore: Send + Sync {
    /// Persist one new policy version.
    fn persist_version(&self, policy: &Policy) -> Result<(), DomainError>;

    /// Load every retained version of every policy, for hydration.
    fn load_all(&self) -> Result<Vec<Policy>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_store_is_object_safe() {
        fn _check(store: &dyn PolicyStore) {
            let _ = store.load_all();
        }
    }
}
