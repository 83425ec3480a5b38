use std::collections::BTreeMap;

use crate::common::error::DomainError;

use super::entity::{EncryptedBlob, Secret, SecretName, SecretStatus, SecretVersion};
use super::error::SecretsError;

/// In-memory vault state: secret metadata and encrypted version chains.
///
/// The engine never sees plaintext. Encryption and decryption happen in
/// the application layer through the cipher and key-provider ports; the
/// engine owns the version lifecycle: Active → Deprecated (grace window)
/// → Revoked. Versions are never removed, only revoked.
#[derive(Debug, Default)]
pub struct VaultEngine {
    secrets: BTreeMap<SecretName, Secret>,
}

impl VaultEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a secret at version 1.
    pub fn create(
        &mut self,
        name: SecretName,
        blob: EncryptedBlob,
        now_ms: u64,
    ) -> Result<u64, DomainError> {
        name.validate()?;
        if self.secrets.contains_key(&name) {
            return Err(SecretsError::DuplicateSecret {
                name: name.0.clone(),
            }
            .into());
        }

        self.secrets.insert(
            name.clone(),
            Secret {
                name,
                versions: vec![SecretVersion {
                    version: 1,
                    status: SecretStatus::Active,
                    created_at_ms: now_ms,
                    deprecated_expires_at_ms: None,
                    blob,
                }],
                access_count: 0,
                created_at_ms: now_ms,
            },
        );
        Ok(1)
    }

    /// Resolve the version a default read returns: the newest Active one.
    pub fn resolve_read(&self, name: &SecretName) -> Result<&SecretVersion, DomainError> {
        let secret = self.get(name)?;
        secret
            .active_version()
            .ok_or_else(|| {
                SecretsError::NoActiveVersion {
                    name: name.0.clone(),
                }
                .into()
            })
    }

    /// Resolve a pinned version. Deprecated versions still resolve inside
    /// their grace window; Revoked or expired versions do not.
    pub fn resolve_version(
        &self,
        name: &SecretName,
        version: u64,
        now_ms: u64,
    ) -> Result<&SecretVersion, DomainError> {
        let secret = self.get(name)?;
        let not_found = || SecretsError::VersionNotFound {
            name: name.0.clone(),
            version,
        };

        let v = secret.version(version).ok_or_else(not_found)?;
        match v.status {
            SecretStatus::Active => Ok(v),
            SecretStatus::Deprecated => {
                let expired = v
                    .deprecated_expires_at_ms
                    .is_some_and(|expiry| now_ms > expiry);
                if expired {
                    Err(not_found().into())
                } else {
                    Ok(v)
                }
            }
            SecretStatus::Revoked => Err(not_found().into()),
        }
    }

    /// Rotate: append a new Active version and deprecate the previous one
    /// with a grace expiry of `now + grace_ms`. Returns the new version.
    pub fn rotate(
        &mut self,
        name: &SecretName,
        blob: EncryptedBlob,
        grace_ms: u64,
        now_ms: u64,
    ) -> Result<u64, DomainError> {
        let secret = self
            .secrets
            .get_mut(name)
            .ok_or_else(|| SecretsError::SecretNotFound {
                name: name.0.clone(),
            })?;

        let new_version = secret.latest_version_number() + 1;
        for v in &mut secret.versions {
            if v.status == SecretStatus::Active {
                v.status = SecretStatus::Deprecated;
                v.deprecated_expires_at_ms = Some(now_ms + grace_ms);
            }
        }
        secret.versions.push(SecretVersion {
            version: new_version,
            status: SecretStatus::Active,
            created_at_ms: now_ms,
            deprecated_expires_at_ms: None,
            blob,
        });
        Ok(new_version)
    }

    /// Revoke one version immediately.
    pub fn revoke(&mut self, name: &SecretName, version: u64) -> Result<(), DomainError> {
        let secret = self
            .secrets
            .get_mut(name)
            .ok_or_else(|| SecretsError::SecretNotFound {
                name: name.0.clone(),
            })?;
        let v = secret
            .versions
            .iter_mut()
            .find(|v| v.version == version)
            .ok_or_else(|| SecretsError::VersionNotFound {
                name: name.0.clone(),
                version,
            })?;
        v.status = SecretStatus::Revoked;
        v.deprecated_expires_at_ms = None;
        Ok(())
    }

    /// Sweep: flip every Deprecated version whose grace expiry has passed
    /// to Revoked. Returns the `(name, version)` pairs that were revoked.
    pub fn expire_deprecated(&mut self, now_ms: u64) -> Vec<(SecretName, u64)> {
        let mut revoked = Vec::new();
        for secret in self.secrets.values_mut() {
            for v in &mut secret.versions {
                if v.status == SecretStatus::Deprecated
                    && v.deprecated_expires_at_ms
                        .is_some_and(|expiry| now_ms > expiry)
                {
                    v.status = SecretStatus::Revoked;
                    v.deprecated_expires_at_ms = None;
                    revoked.push((secret.name.clone(), v.version));
                }
            }
        }
        revoked
    }

    /// Count a successful read (spec: per-secret access counter).
    pub fn note_access(&mut self, name: &SecretName) {
        if let Some(secret) = self.secrets.get_mut(name) {
            secret.access_count += 1;
        }
    }

    pub fn get(&self, name: &SecretName) -> Result<&Secret, DomainError> {
        self.secrets
            .get(name)
            .ok_or_else(|| {
                SecretsError::SecretNotFound {
                    name: name.0.clone(),
                }
                .into()
            })
    }

    pub fn secrets(&self) -> impl Iterator<Item = &Secret> {
        self.secrets.values()
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    /// Hydrate from persisted state.
    pub fn load(&mut self, secrets: Vec<Secret>) -> Result<(), DomainError> {
        let mut map = BTreeMap::new();
        for secret in secrets {
            secret.name.validate()?;
            map.insert(secret.name.clone(), secret);
        }
        self.secrets = map;
        Ok(())
    }
}
