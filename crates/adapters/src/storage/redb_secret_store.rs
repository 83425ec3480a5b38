use std::path::Path;

use domain::common::error::DomainError;
use domain::rotation::entity::RotationPolicy;
use domain::secrets::entity::Secret;
use ports::secondary::secret_store::SecretStore;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

/// redb table: key = secret name, value = JSON-serialized `Secret`
/// (full version chain, encrypted blobs only).
const SECRETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("secrets");

/// redb table: key = secret name, value = JSON-serialized `RotationPolicy`.
const POLICIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("rotation_policies");

/// Persistent secret store backed by redb. Plaintext never reaches this
/// adapter; everything stored is envelope-encrypted upstream.
pub struct RedbSecretStore {
    db: Database,
}

impl RedbSecretStore {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path) -> Result<Self, DomainError> {
        let db = Database::create(path)
            .map_err(|e| DomainError::StoreFailed(format!("redb open failed: {e}")))?;

        let txn = db
            .begin_write()
            .map_err(|e| DomainError::StoreFailed(format!("redb txn begin: {e}")))?;
        {
            let _secrets = txn
                .open_table(SECRETS_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb table create: {e}")))?;
            let _policies = txn
                .open_table(POLICIES_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb table create: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::StoreFailed(format!("redb commit: {e}")))?;

        Ok(Self { db })
    }
}

impl SecretStore for RedbSecretStore {
    fn persist_secret(&self, secret: &Secret) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec(secret)
            .map_err(|e| DomainError::StoreFailed(format!("serialize secret: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| DomainError::StoreFailed(format!("redb write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(SECRETS_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb write table: {e}")))?;
            table
                .insert(secret.name.0.as_str(), bytes.as_slice())
                .map_err(|e| DomainError::StoreFailed(format!("redb insert: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::StoreFailed(format!("redb write commit: {e}")))?;
        Ok(())
    }

    fn load_secrets(&self) -> Result<Vec<Secret>, DomainError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| DomainError::StoreFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(SECRETS_TABLE)
            .map_err(|e| DomainError::StoreFailed(format!("redb read table: {e}")))?;

        let mut secrets = Vec::new();
        let iter = table
            .iter()
            .map_err(|e| DomainError::StoreFailed(format!("redb iter: {e}")))?;
        for row in iter {
            let (_key, value) =
                row.map_err(|e| DomainError::StoreFailed(format!("redb iter row: {e}")))?;
            let secret: Secret = serde_json::from_slice(value.value())
                .map_err(|e| DomainError::StoreFailed(format!("deserialize secret: {e}")))?;
            secrets.push(secret);
        }
        Ok(secrets)
    }

    fn persist_policy(&self, policy: &RotationPolicy) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec(policy)
            .map_err(|e| DomainError::StoreFailed(format!("serialize policy: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| DomainError::StoreFailed(format!("redb write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(POLICIES_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb write table: {e}")))?;
            table
                .insert(policy.secret_name.as_str(), bytes.as_slice())
                .map_err(|e| DomainError::StoreFailed(format!("redb insert: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::StoreFailed(format!("redb write commit: {e}")))?;
        Ok(())
    }

    fn remove_policy(&self, secret_name: &str) -> Result<(), DomainError> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| DomainError::StoreFailed(format!("redb write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(POLICIES_TABLE)
                .map_err(|e| DomainError::StoreFailed(format!("redb write table: {e}")))?;
            table
                .remove(secret_name)
                .map_err(|e| DomainError::StoreFailed(format!("redb remove: {e}")))?;
        }
        txn.commit()
            .map_err(|e| DomainError::StoreFailed(format!("redb write commit: {e}")))?;
        Ok(())
    }

    fn load_policies(&self) -> Result<Vec<RotationPolicy>, DomainError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| DomainError::StoreFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(POLICIES_TABLE)
            .map_err(|e| DomainError::StoreFailed(format!("redb read table: {e}")))?;

        let mut policies = Vec::new();
        let iter = table
            .iter()
            .map_err(|e| DomainError::StoreFailed(format!("redb iter: {e}")))?;
        for row in iter {
            let (_key, value) =
                row.map_err(|e| DomainError::StoreFailed(format!("redb iter row: {e}")))?;
            let policy: RotationPolicy = serde_json::from_slice(value.value())
                .map_err(|e| DomainError::StoreFailed(format!("deserialize policy: {e}")))?;
            policies.push(policy);
        }
        Ok(policies)
    }
}
