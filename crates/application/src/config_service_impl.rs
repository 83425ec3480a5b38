use std::sync::Arc;

use domain::common::entity::{EntityKind, Environment};
use domain::common::error::DomainError;
use domain::config::engine::ConfigEngine;
use domain::config::entity::{ConfigChange, ConfigEntry, ConfigKey};
use domain::propagation::entity::ChangeEvent;
use ports::secondary::config_entry_store::ConfigEntryStore;
use ports::secondary::metrics_port::MetricsPort;

use crate::clock::now_ms;
use crate::propagator::ChangePropagator;

/// Application-level config store service.
///
/// Orchestrates the versioned config engine, write-through persistence,
/// change propagation, and metrics. Designed to be wrapped in `RwLock`
/// for shared access. The engine is authoritative; persistence and
/// propagation are applied after a mutation succeeds and never roll it
/// back.
pub struct ConfigAppService {
    engine: ConfigEngine,
    store: Option<Arc<dyn ConfigEntryStore>>,
    propagator: Option<ChangePropagator>,
    metrics: Arc<dyn MetricsPort>,
}

impl ConfigAppService {
    pub fn new(engine: ConfigEngine, metrics: Arc<dyn MetricsPort>) -> Self {
        Self {
            engine,
            store: None,
            propagator: None,
            metrics,
        }
    }

    /// Attach write-through persistence.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ConfigEntryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach the change propagator.
    #[must_use]
    pub fn with_propagator(mut self, propagator: ChangePropagator) -> Self {
        self.propagator = Some(propagator);
        self
    }

    /// Hydrate the engine from the attached store.
    pub fn hydrate(&mut self) -> Result<(), DomainError> {
        if let Some(store) = &self.store {
            self.engine.load(store.load_all()?)?;
        }
        self.metrics.set_config_entries(self.engine.entry_count() as u64);
        Ok(())
    }

    /// Resolve an entry with environment inheritance.
    pub fn get(&self, key: &ConfigKey, environment: &Environment) -> Result<&ConfigEntry, DomainError> {
        self.engine.get(key, environment)
    }

    /// Versioned write. Returns the new version.
    pub fn put(
        &mut self,
        key: ConfigKey,
        environment: Environment,
        value: String,
        expected_version: u64,
        actor: &str,
    ) -> Result<u64, DomainError> {
        let now = now_ms();
        let result = self
            .engine
            .put(key.clone(), environment.clone(), value, expected_version, actor, now);

        let version = match result {
            Ok(version) => version,
            Err(e) => {
                let outcome = match &e {
                    DomainError::VersionConflict { .. } => {
                        self.metrics.record_version_conflict("config");
                        "conflict"
                    }
                    _ => "invalid",
                };
                self.metrics.record_config_write(&environment.0, outcome);
                return Err(e);
            }
        };

        self.metrics.record_config_write(&environment.0, "success");
        self.metrics.set_config_entries(self.engine.entry_count() as u64);
        self.after_mutation(&key, &environment, version);
        Ok(version)
    }

    /// Versioned soft delete. Returns the tombstone version.
    pub fn delete(
        &mut self,
        key: &ConfigKey,
        environment: &Environment,
        expected_version: u64,
        actor: &str,
    ) -> Result<u64, DomainError> {
        let now = now_ms();
        let version = self
            .engine
            .delete(key, environment, expected_version, actor, now)
            .inspect_err(|e| {
                if matches!(e, DomainError::VersionConflict { .. }) {
                    self.metrics.record_version_conflict("config");
                }
            })?;

        self.metrics.record_config_write(&environment.0, "deleted");
        self.after_mutation(key, environment, version);
        Ok(version)
    }

    pub fn history(
        &self,
        key: &ConfigKey,
        environment: &Environment,
    ) -> Result<&[ConfigChange], DomainError> {
        self.engine.history(key, environment)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.engine.entries()
    }

    pub fn entry_count(&self) -> usize {
        self.engine.entry_count()
    }

    /// Write-through persistence and change propagation, both best-effort:
    /// the engine mutation has already been applied.
    fn after_mutation(&self, key: &ConfigKey, environment: &Environment, version: u64) {
        if let Some(store) = &self.store {
            let entry = self.engine.entries().find(|e| {
                e.key == *key && e.environment == *environment
            });
            let change = self
                .engine
                .history(key, environment)
                .ok()
                .and_then(|h| h.last());
            if let (Some(entry), Some(change)) = (entry, change) {
                if let Err(e) = store.persist(entry, change) {
                    tracing::error!(
                        key = %key,
                        environment = %environment,
                        error = %e,
                        "config write-through persistence failed"
                    );
                }
            }
        }

        if let Some(propagator) = &self.propagator {
            propagator.publish(ChangeEvent {
                kind: EntityKind::Config,
                key: format!("{environment}/{key}"),
                version,
                payload: String::new(),
                occurred_at_ms: now_ms(),
            });
        }
    }
}
