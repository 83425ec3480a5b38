use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use domain::common::entity::EntityKind;
use domain::common::error::DomainError;
use domain::propagation::entity::ChangeEvent;
use domain::secrets::engine::VaultEngine;
use domain::secrets::entity::{Secret, SecretAccessRecord, SecretName, SecretVersion};
use domain::secrets::query::AccessLogQuery;
use ports::secondary::access_log_store::AccessLogStore;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::secret_cipher::SecretCipher;
use ports::secondary::secret_store::SecretStore;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::clock::now_ms;
use crate::propagator::ChangePropagator;

/// Bytes of random material generated for scheduler-driven rotations.
const GENERATED_SECRET_BYTES: usize = 32;

/// Application-level secrets vault service.
///
/// Orchestrates the vault engine, envelope cipher, mandatory access
/// audit, persistence, and change propagation. Designed to be wrapped in
/// `RwLock` for shared access.
///
/// The read path is fail-closed twice over: the access-log write must
/// succeed before decryption starts, and the whole read is bounded by a
/// timeout — expiry returns an error, never unaudited plaintext.
pub struct SecretsAppService {
    vault: VaultEngine,
    cipher: Arc<dyn SecretCipher>,
    access_log: Arc<dyn AccessLogStore>,
    store: Option<Arc<dyn SecretStore>>,
    propagator: Option<ChangePropagator>,
    metrics: Arc<dyn MetricsPort>,
    read_timeout: Duration,
}

impl SecretsAppService {
    pub fn new(
        vault: VaultEngine,
        cipher: Arc<dyn SecretCipher>,
        access_log: Arc<dyn AccessLogStore>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            vault,
            cipher,
            access_log,
            store: None,
            propagator: None,
            metrics,
            read_timeout: Duration::from_secs(5),
        }
    }

    /// Attach write-through persistence.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach the change propagator.
    #[must_use]
    pub fn with_propagator(mut self, propagator: ChangePropagator) -> Self {
        self.propagator = Some(propagator);
        self
    }

    /// Override the read timeout (default 5s).
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Hydrate the vault from the attached store.
    pub fn hydrate(&mut self) -> Result<(), DomainError> {
        if let Some(store) = &self.store {
            self.vault.load(store.load_secrets()?)?;
        }
        self.update_gauges();
        Ok(())
    }

    /// Create a secret at version 1.
    pub fn create(&mut self, name: SecretName, plaintext: &str) -> Result<u64, DomainError> {
        let blob = self.cipher.encrypt(plaintext.as_bytes())?;
        let version = self.vault.create(name.clone(), blob, now_ms())?;
        self.persist(&name);
        self.publish(&name, version);
        self.update_gauges();
        Ok(version)
    }

    /// Read the current plaintext of a secret, bounded by the read
    /// timeout. The access record is written before decryption; if that
    /// write fails the read fails closed.
    pub async fn read(&mut self, name: &SecretName, caller: &str) -> Result<String, DomainError> {
        let timeout = self.read_timeout;
        match tokio::time::timeout(timeout, self.read_inner(name, None, caller)).await {
            Ok(result) => result,
            Err(_) => {
                self.metrics.record_secret_read("timeout");
                Err(DomainError::EncryptionFailed(format!(
                    "secret read timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Read a pinned version; Deprecated versions resolve inside their
    /// grace window, Revoked versions do not.
    pub async fn read_version(
        &mut self,
        name: &SecretName,
        version: u64,
        caller: &str,
    ) -> Result<String, DomainError> {
        let timeout = self.read_timeout;
        match tokio::time::timeout(timeout, self.read_inner(name, Some(version), caller)).await {
            Ok(result) => result,
            Err(_) => {
                self.metrics.record_secret_read("timeout");
                Err(DomainError::EncryptionFailed(format!(
                    "secret read timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }

    async fn read_inner(
        &mut self,
        name: &SecretName,
        version: Option<u64>,
        caller: &str,
    ) -> Result<String, DomainError> {
        let now = now_ms();
        let resolved = match version {
            Some(v) => self.vault.resolve_version(name, v, now),
            None => self.vault.resolve_read(name),
        };

        let resolved = match resolved {
            Ok(v) => v.clone(),
            Err(e) => {
                // Failed lookups are logged too, best-effort.
                let record = SecretAccessRecord {
                    secret_name: name.0.clone(),
                    version: version.unwrap_or(0),
                    accessed_by: caller.to_string(),
                    accessed_at_ms: now,
                    success: false,
                };
                if let Err(log_err) = self.access_log.store_record(&record) {
                    tracing::warn!(secret = %name, error = %log_err, "failed-access log write failed");
                }
                self.metrics.record_secret_read("not_found");
                return Err(e);
            }
        };

        // Mandatory audit: the record must be durable before any
        // plaintext leaves the vault.
        let record = SecretAccessRecord {
            secret_name: name.0.clone(),
            version: resolved.version,
            accessed_by: caller.to_string(),
            accessed_at_ms: now,
            success: true,
        };
        if let Err(e) = self.access_log.store_record(&record) {
            self.metrics.record_audit_failure();
            self.metrics.record_secret_read("audit_failed");
            return Err(DomainError::AuditFailed(e.to_string()));
        }

        let plaintext = self.decrypt(&resolved)?;
        self.vault.note_access(name);
        self.persist(name);
        self.metrics.record_secret_read("success");
        Ok(plaintext)
    }

    fn decrypt(&self, version: &SecretVersion) -> Result<String, DomainError> {
        let bytes = self.cipher.decrypt(&version.blob)?;
        String::from_utf8(bytes)
            .map_err(|_| DomainError::EncryptionFailed("plaintext is not valid UTF-8".to_string()))
    }

    /// Rotate a secret to a new version. When `new_plaintext` is `None`
    /// (scheduler-driven rotation), fresh random material is generated.
    /// Returns the new version.
    pub fn rotate(
        &mut self,
        name: &SecretName,
        new_plaintext: Option<String>,
        grace_period_ms: u64,
    ) -> Result<u64, DomainError> {
        let plaintext = new_plaintext.unwrap_or_else(generate_secret_material);
        let blob = self.cipher.encrypt(plaintext.as_bytes())?;
        let version = self.vault.rotate(name, blob, grace_period_ms, now_ms())?;
        self.metrics.record_rotation("success");
        self.persist(name);
        self.publish(name, version);
        self.update_gauges();
        Ok(version)
    }

    /// Out-of-schedule rotation. With `immediate`, the previous version
    /// is revoked at once (no grace overlap) and the change event is
    /// published before this call returns.
    pub fn emergency_rotate(
        &mut self,
        name: &SecretName,
        immediate: bool,
        grace_period_ms: u64,
    ) -> Result<u64, DomainError> {
        let grace = if immediate { 0 } else { grace_period_ms };
        let previous = self.vault.get(name)?.latest_version_number();
        let version = self.rotate(name, None, grace)?;
        if immediate && previous > 0 {
            self.vault.revoke(name, previous)?;
            self.persist(name);
            self.publish(name, version);
        }
        Ok(version)
    }

    /// Revoke one version immediately.
    pub fn revoke(&mut self, name: &SecretName, version: u64) -> Result<(), DomainError> {
        self.vault.revoke(name, version)?;
        self.persist(name);
        self.publish(name, self.vault.get(name)?.latest_version_number());
        self.update_gauges();
        Ok(())
    }

    /// Sweep deprecated versions past their grace expiry. Returns the
    /// number revoked.
    pub fn expire_deprecated(&mut self) -> usize {
        let revoked = self.vault.expire_deprecated(now_ms());
        for (name, version) in &revoked {
            tracing::info!(secret = %name, version, "grace period ended, version revoked");
            self.persist(name);
            self.publish(name, *version);
        }
        if !revoked.is_empty() {
            self.update_gauges();
        }
        revoked.len()
    }

    pub fn get(&self, name: &SecretName) -> Result<&Secret, DomainError> {
        self.vault.get(name)
    }

    pub fn secrets(&self) -> impl Iterator<Item = &Secret> {
        self.vault.secrets()
    }

    pub fn secret_count(&self) -> usize {
        self.vault.secret_count()
    }

    /// Query the access log, newest first.
    pub fn access_log(&self, query: &AccessLogQuery) -> Result<Vec<SecretAccessRecord>, DomainError> {
        self.access_log.query_records(query)
    }

    fn persist(&self, name: &SecretName) {
        if let Some(store) = &self.store {
            if let Ok(secret) = self.vault.get(name) {
                if let Err(e) = store.persist_secret(secret) {
                    tracing::error!(secret = %name, error = %e, "secret write-through persistence failed");
                }
            }
        }
    }

    /// Secret change events carry metadata only, never key material.
    fn publish(&self, name: &SecretName, version: u64) {
        if let Some(propagator) = &self.propagator {
            propagator.publish(ChangeEvent {
                kind: EntityKind::Secret,
                key: name.0.clone(),
                version,
                payload: String::new(),
                occurred_at_ms: now_ms(),
            });
        }
    }

    fn update_gauges(&self) {
        self.metrics.set_secrets_total(self.vault.secret_count() as u64);
        let deprecated = self
            .vault
            .secrets()
            .flat_map(|s| s.versions.iter())
            .filter(|v| v.status == domain::secrets::entity::SecretStatus::Deprecated)
            .count();
        self.metrics.set_deprecated_versions(deprecated as u64);
    }
}

/// Fresh URL-safe random material for generated rotations.
fn generate_secret_material() -> String {
    let mut bytes = [0u8; GENERATED_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
