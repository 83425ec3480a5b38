use std::collections::BTreeMap;

use crate::common::entity::Environment;
use crate::common::error::DomainError;

use super::entity::{ConfigChange, ConfigEntry, ConfigKey, MAX_VALUE_SIZE};
use super::error::ConfigError;

/// In-memory versioned config store.
///
/// Entries are keyed by `(environment, key)`. Every mutation is guarded by
/// optimistic concurrency: the caller must supply the version it read (0
/// for creates), and a mismatch is rejected with a conflict — there is no
/// last-writer-wins path. History is append-only and never truncated, so
/// `entry.version == history.len()` holds for every entry.
#[derive(Debug, Default)]
pub struct ConfigEngine {
    entries: BTreeMap<(Environment, ConfigKey), ConfigEntry>,
    history: BTreeMap<(Environment, ConfigKey), Vec<ConfigChange>>,
}

impl ConfigEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an entry with environment inheritance.
    ///
    /// An exact `(environment, key)` entry wins, even as a tombstone: a
    /// soft-deleted override means "this key is gone here" and does not
    /// re-expose the global value. Only a missing override falls back to
    /// `global`.
    pub fn get(&self, key: &ConfigKey, environment: &Environment) -> Result<&ConfigEntry, DomainError> {
        if let Some(entry) = self.entries.get(&(environment.clone(), key.clone())) {
            if entry.deleted {
                return Err(ConfigError::EntryNotFound {
                    key: format!("{environment}/{key}"),
                }
                .into());
            }
            return Ok(entry);
        }

        if !environment.is_global() {
            if let Some(entry) = self.entries.get(&(Environment::global(), key.clone())) {
                if !entry.deleted {
                    return Ok(entry);
                }
            }
        }

        Err(ConfigError::EntryNotFound {
            key: format!("{environment}/{key}"),
        }
        .into())
    }

    /// Write a value. `expected_version` must be 0 for a create and the
    /// current version for an update; anything else conflicts.
    ///
    /// Returns the new version.
    pub fn put(
        &mut self,
        key: ConfigKey,
        environment: Environment,
        value: String,
        expected_version: u64,
        actor: &str,
        now_ms: u64,
    ) -> Result<u64, DomainError> {
        key.validate()?;
        environment
            .validate()
            .map_err(|reason| ConfigError::InvalidEnvironment(reason.to_string()))?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(ConfigError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            }
            .into());
        }

        let map_key = (environment.clone(), key.clone());
        let current_version = self.entries.get(&map_key).map_or(0, |e| e.version);
        if expected_version != current_version {
            return Err(ConfigError::VersionConflict {
                key: format!("{environment}/{key}"),
                expected: expected_version,
                current: current_version,
            }
            .into());
        }

        let new_version = current_version + 1;
        match self.entries.get_mut(&map_key) {
            Some(entry) => {
                entry.value = value.clone();
                entry.version = new_version;
                entry.updated_at_ms = now_ms;
                entry.updated_by = actor.to_string();
                entry.deleted = false;
            }
            None => {
                self.entries.insert(
                    map_key.clone(),
                    ConfigEntry {
                        key,
                        environment,
                        value: value.clone(),
                        version: new_version,
                        created_at_ms: now_ms,
                        updated_at_ms: now_ms,
                        created_by: actor.to_string(),
                        updated_by: actor.to_string(),
                        deleted: false,
                    },
                );
            }
        }

        self.history.entry(map_key).or_default().push(ConfigChange {
            version: new_version,
            value,
            changed_by: actor.to_string(),
            changed_at_ms: now_ms,
            deleted: false,
        });

        Ok(new_version)
    }

    /// Soft-delete an entry. The tombstone is recorded in history and the
    /// version counter keeps increasing; nothing is physically removed.
    pub fn delete(
        &mut self,
        key: &ConfigKey,
        environment: &Environment,
        expected_version: u64,
        actor: &str,
        now_ms: u64,
    ) -> Result<u64, DomainError> {
        let map_key = (environment.clone(), key.clone());
        let entry = self
            .entries
            .get_mut(&map_key)
            .filter(|e| !e.deleted)
            .ok_or_else(|| ConfigError::EntryNotFound {
                key: format!("{environment}/{key}"),
            })?;

        if expected_version != entry.version {
            return Err(ConfigError::VersionConflict {
                key: format!("{environment}/{key}"),
                expected: expected_version,
                current: entry.version,
            }
            .into());
        }

        entry.version += 1;
        entry.deleted = true;
        entry.updated_at_ms = now_ms;
        entry.updated_by = actor.to_string();
        let new_version = entry.version;
        let tombstone_value = entry.value.clone();

        self.history.entry(map_key).or_default().push(ConfigChange {
            version: new_version,
            value: tombstone_value,
            changed_by: actor.to_string(),
            changed_at_ms: now_ms,
            deleted: true,
        });

        Ok(new_version)
    }

    /// The full append-only change list for an entry.
    pub fn history(
        &self,
        key: &ConfigKey,
        environment: &Environment,
    ) -> Result<&[ConfigChange], DomainError> {
        self.history
            .get(&(environment.clone(), key.clone()))
            .map(Vec::as_slice)
            .ok_or_else(|| {
                ConfigError::EntryNotFound {
                    key: format!("{environment}/{key}"),
                }
                .into()
            })
    }

    /// All entries, tombstones included (for persistence and listing).
    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.values()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Hydrate from persisted state. Rejects snapshots whose version
    /// counters do not match their history length.
    pub fn load(
        &mut self,
        snapshot: Vec<(ConfigEntry, Vec<ConfigChange>)>,
    ) -> Result<(), DomainError> {
        let mut entries = BTreeMap::new();
        let mut history = BTreeMap::new();
        for (entry, changes) in snapshot {
            if entry.version as usize != changes.len() {
                return Err(DomainError::StoreFailed(format!(
                    "config '{}/{}': version {} does not match history length {}",
                    entry.environment,
                    entry.key,
                    entry.version,
                    changes.len()
                )));
            }
            let map_key = (entry.environment.clone(), entry.key.clone());
            entries.insert(map_key.clone(), entry);
            history.insert(map_key, changes);
        }
        self.entries = entries;
        self.history = history;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ConfigKey {
        ConfigKey(s.to_string())
    }

    fn env(s: &str) -> Environment {
        Environment(s.to_string())
    }

    fn put(engine: &mut ConfigEngine, k: &str, e: &str, v: &str, expected: u64) -> Result<u64, DomainError> {
        engine.put(key(k), env(e), v.to_string(), expected, "tester", 1000)
    }

    // ── Versioning and concurrency ────────────────────────────────────

    #[test]
    fn create_starts_at_version_one() {
        let mut engine = ConfigEngine::new();
        assert_eq!(put(&mut engine, "db.timeout", "prod", "30", 0).unwrap(), 1);
    }

    #[test]
    fn version_strictly_increases_and_matches_history() {
        let mut engine = ConfigEngine::new();
        for i in 0..5u64 {
            let v = put(&mut engine, "db.timeout", "prod", &format!("{i}"), i).unwrap();
            assert_eq!(v, i + 1);
        }
        let history = engine.history(&key("db.timeout"), &env("prod")).unwrap();
        assert_eq!(history.len(), 5);
        for (i, change) in history.iter().enumerate() {
            assert_eq!(change.version, i as u64 + 1);
        }
    }

    #[test]
    fn stale_expected_version_conflicts() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "db.timeout", "prod", "30", 0).unwrap();
        put(&mut engine, "db.timeout", "prod", "60", 1).unwrap();

        let err = put(&mut engine, "db.timeout", "prod", "90", 1).unwrap_err();
        assert!(matches!(
            err,
            DomainError::VersionConflict {
                expected: 1,
                current: 2,
                ..
            }
        ));
        // The stale write was not applied.
        let entry = engine.get(&key("db.timeout"), &env("prod")).unwrap();
        assert_eq!(entry.value, "60");
        assert_eq!(entry.version, 2);
    }

    #[test]
    fn create_on_existing_entry_conflicts() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "db.timeout", "prod", "30", 0).unwrap();
        let err = put(&mut engine, "db.timeout", "prod", "60", 0).unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict { .. }));
    }

    #[test]
    fn if_match_scenario() {
        // write v1, update with If-Match: 1 → v2, stale If-Match: 1 → conflict
        let mut engine = ConfigEngine::new();
        assert_eq!(put(&mut engine, "db.timeout", "prod", "30", 0).unwrap(), 1);
        assert_eq!(put(&mut engine, "db.timeout", "prod", "60", 1).unwrap(), 2);
        assert!(matches!(
            put(&mut engine, "db.timeout", "prod", "90", 1).unwrap_err(),
            DomainError::VersionConflict { .. }
        ));
    }

    // ── Environment inheritance ───────────────────────────────────────

    #[test]
    fn lookup_falls_back_to_global() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "log.level", "global", "info", 0).unwrap();

        let entry = engine.get(&key("log.level"), &env("prod")).unwrap();
        assert_eq!(entry.value, "info");
        assert!(entry.environment.is_global());
    }

    #[test]
    fn override_shadows_global() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "log.level", "global", "info", 0).unwrap();
        put(&mut engine, "log.level", "prod", "warn", 0).unwrap();

        let entry = engine.get(&key("log.level"), &env("prod")).unwrap();
        assert_eq!(entry.value, "warn");
        // Other environments still see the global value.
        let entry = engine.get(&key("log.level"), &env("staging")).unwrap();
        assert_eq!(entry.value, "info");
    }

    #[test]
    fn missing_key_not_found() {
        let engine = ConfigEngine::new();
        assert!(matches!(
            engine.get(&key("nope"), &env("prod")).unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    // ── Soft delete ───────────────────────────────────────────────────

    #[test]
    fn delete_is_soft_and_versioned() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "db.timeout", "prod", "30", 0).unwrap();
        let v = engine
            .delete(&key("db.timeout"), &env("prod"), 1, "tester", 2000)
            .unwrap();
        assert_eq!(v, 2);

        assert!(engine.get(&key("db.timeout"), &env("prod")).is_err());
        // History retains both the write and the tombstone.
        let history = engine.history(&key("db.timeout"), &env("prod")).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].deleted);
    }

    #[test]
    fn deleted_override_does_not_reexpose_global() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "log.level", "global", "info", 0).unwrap();
        put(&mut engine, "log.level", "prod", "warn", 0).unwrap();
        engine
            .delete(&key("log.level"), &env("prod"), 1, "tester", 2000)
            .unwrap();

        assert!(engine.get(&key("log.level"), &env("prod")).is_err());
    }

    #[test]
    fn delete_with_stale_version_conflicts() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "db.timeout", "prod", "30", 0).unwrap();
        put(&mut engine, "db.timeout", "prod", "60", 1).unwrap();
        assert!(matches!(
            engine
                .delete(&key("db.timeout"), &env("prod"), 1, "tester", 2000)
                .unwrap_err(),
            DomainError::VersionConflict { .. }
        ));
    }

    #[test]
    fn delete_missing_entry_not_found() {
        let mut engine = ConfigEngine::new();
        assert!(matches!(
            engine
                .delete(&key("nope"), &env("prod"), 1, "tester", 2000)
                .unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[test]
    fn rewrite_after_delete_resumes_version_counter() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "db.timeout", "prod", "30", 0).unwrap();
        engine
            .delete(&key("db.timeout"), &env("prod"), 1, "tester", 2000)
            .unwrap();
        // Tombstone is at v2; a new write must CAS against it.
        assert!(put(&mut engine, "db.timeout", "prod", "45", 0).is_err());
        assert_eq!(put(&mut engine, "db.timeout", "prod", "45", 2).unwrap(), 3);
        let entry = engine.get(&key("db.timeout"), &env("prod")).unwrap();
        assert_eq!(entry.version, 3);
        assert_eq!(engine.history(&key("db.timeout"), &env("prod")).unwrap().len(), 3);
    }

    // ── Validation ────────────────────────────────────────────────────

    #[test]
    fn rejects_invalid_key() {
        let mut engine = ConfigEngine::new();
        assert!(put(&mut engine, "bad key", "prod", "x", 0).is_err());
    }

    #[test]
    fn rejects_invalid_environment() {
        let mut engine = ConfigEngine::new();
        assert!(put(&mut engine, "db.timeout", "Prod", "x", 0).is_err());
    }

    #[test]
    fn rejects_oversized_value() {
        let mut engine = ConfigEngine::new();
        let huge = "x".repeat(MAX_VALUE_SIZE + 1);
        let err = engine
            .put(key("db.timeout"), env("prod"), huge, 0, "tester", 1000)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    // ── Hydration ─────────────────────────────────────────────────────

    #[test]
    fn load_round_trip() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "db.timeout", "prod", "30", 0).unwrap();
        put(&mut engine, "db.timeout", "prod", "60", 1).unwrap();

        let snapshot: Vec<_> = engine
            .entries()
            .cloned()
            .map(|e| {
                let h = engine.history(&e.key, &e.environment).unwrap().to_vec();
                (e, h)
            })
            .collect();

        let mut restored = ConfigEngine::new();
        restored.load(snapshot).unwrap();
        let entry = restored.get(&key("db.timeout"), &env("prod")).unwrap();
        assert_eq!(entry.version, 2);
        assert_eq!(entry.value, "60");
    }

    #[test]
    fn load_rejects_version_history_mismatch() {
        let mut engine = ConfigEngine::new();
        put(&mut engine, "db.timeout", "prod", "30", 0).unwrap();
        let entry = engine.get(&key("db.timeout"), &env("prod")).unwrap().clone();

        let mut restored = ConfigEngine::new();
        // Entry claims v1 but history is empty.
        assert!(restored.load(vec![(entry, vec![])]).is_err());
    }
}
