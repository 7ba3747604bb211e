//! Configuration manager.
//!
//! Versioned CRUD over an injected [`ConfigStorePort`]. Every write runs
//! under one lock so read-modify-write sequences (default switching, updates)
//! cannot interleave. Invariant: at most one default per algorithm, and the
//! default can only be replaced, never deleted.

use crate::domain::algorithm::{Algorithm, BreadthAlgorithm};
use crate::domain::configuration::{AlgorithmKind, Configuration, generate_version};
use crate::domain::error::BreadthError;
use crate::domain::validation::ConfigValidation;
use crate::ports::config_store_port::ConfigStorePort;
use chrono::Utc;
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

pub struct ConfigManager {
    store: Box<dyn ConfigStorePort + Send + Sync>,
    write_lock: Mutex<()>,
}

/// Import payload: a single configuration or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Many(Vec<Configuration>),
    One(Box<Configuration>),
}

impl ConfigManager {
    pub fn new(store: Box<dyn ConfigStorePort + Send + Sync>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, BreadthError> {
        self.write_lock.lock().map_err(|e| BreadthError::Storage {
            reason: format!("configuration write lock poisoned: {}", e),
        })
    }

    /// Seed each default whose algorithm has no default yet. Returns how many
    /// were inserted.
    pub fn initialize(&self, defaults: Vec<Configuration>) -> Result<usize, BreadthError> {
        let _guard = self.lock()?;
        let existing = self.store.list()?;
        let mut seeded = 0;
        for mut config in defaults {
            let has_default = existing
                .iter()
                .any(|c| c.algorithm == config.algorithm && c.is_default);
            if has_default {
                continue;
            }
            self.ensure_valid(&config)?;
            config.is_default = true;
            self.store.insert(&config)?;
            seeded += 1;
            info!(version = %config.version, algorithm = %config.algorithm, "seeded default configuration");
        }
        Ok(seeded)
    }

    pub fn validate(&self, config: &Configuration) -> ConfigValidation {
        Algorithm::for_kind(config.algorithm).validate_config(config)
    }

    fn ensure_valid(&self, config: &Configuration) -> Result<(), BreadthError> {
        let result = self.validate(config);
        if result.valid {
            Ok(())
        } else {
            Err(BreadthError::ConfigInvalid {
                version: config.version.clone(),
                errors: result.errors,
            })
        }
    }

    /// Store a new configuration. A configuration created as default takes
    /// over from the algorithm's current default once it is stored; a failed
    /// insert leaves the current default in place.
    pub fn create(&self, config: Configuration) -> Result<Configuration, BreadthError> {
        self.ensure_valid(&config)?;
        let _guard = self.lock()?;
        let mut stored = config.clone();
        stored.is_default = false;
        self.store.insert(&stored)?;
        info!(version = %config.version, algorithm = %config.algorithm, "created configuration");
        if config.is_default {
            return self.promote(stored);
        }
        Ok(stored)
    }

    pub fn get(&self, version: &str) -> Result<Configuration, BreadthError> {
        self.store
            .get(version)?
            .ok_or_else(|| BreadthError::ConfigNotFound {
                version: version.to_string(),
            })
    }

    pub fn get_default(&self, algorithm: AlgorithmKind) -> Result<Configuration, BreadthError> {
        self.store
            .list()?
            .into_iter()
            .find(|c| c.algorithm == algorithm && c.is_default)
            .ok_or_else(|| BreadthError::NoDefaultConfig {
                algorithm: algorithm.to_string(),
            })
    }

    /// All configurations, optionally for one algorithm, ordered by version.
    pub fn list(&self, algorithm: Option<AlgorithmKind>) -> Result<Vec<Configuration>, BreadthError> {
        let mut configs: Vec<Configuration> = self
            .store
            .list()?
            .into_iter()
            .filter(|c| algorithm.is_none_or(|a| c.algorithm == a))
            .collect();
        configs.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(configs)
    }

    /// Read-modify-write under the write lock. Identity, creation time and the
    /// default flag are not editable here.
    pub fn update<F>(&self, version: &str, edit: F) -> Result<Configuration, BreadthError>
    where
        F: FnOnce(&mut Configuration),
    {
        let _guard = self.lock()?;
        let current = self.get(version)?;
        let mut updated = current.clone();
        edit(&mut updated);
        updated.version = current.version;
        updated.created_at = current.created_at;
        updated.is_default = current.is_default;
        updated.algorithm = current.algorithm;
        updated.updated_at = Utc::now();

        self.ensure_valid(&updated)?;
        self.store.update(&updated)?;
        debug!(version = %updated.version, "updated configuration");
        Ok(updated)
    }

    pub fn set_default(&self, version: &str) -> Result<Configuration, BreadthError> {
        let _guard = self.lock()?;
        let config = self.get(version)?;
        if config.is_default {
            return Ok(config);
        }
        self.promote(config)
    }

    /// Make a stored configuration its algorithm's default. Caller holds the
    /// write lock.
    fn promote(&self, mut config: Configuration) -> Result<Configuration, BreadthError> {
        self.clear_default(config.algorithm)?;
        config.is_default = true;
        config.updated_at = Utc::now();
        self.store.update(&config)?;
        info!(version = %config.version, algorithm = %config.algorithm, "default configuration changed");
        Ok(config)
    }

    fn clear_default(&self, algorithm: AlgorithmKind) -> Result<(), BreadthError> {
        for mut other in self.store.list()? {
            if other.algorithm == algorithm && other.is_default {
                other.is_default = false;
                other.updated_at = Utc::now();
                self.store.update(&other)?;
            }
        }
        Ok(())
    }

    /// Delete a configuration. The default of an algorithm cannot be deleted;
    /// make another configuration the default first.
    pub fn delete(&self, version: &str) -> Result<(), BreadthError> {
        let _guard = self.lock()?;
        let config = self.get(version)?;
        if config.is_default {
            return Err(BreadthError::DefaultDeletion {
                version: config.version,
                algorithm: config.algorithm.to_string(),
            });
        }
        self.store.delete(version)?;
        info!(version = %version, "deleted configuration");
        Ok(())
    }

    pub fn clone_configuration(
        &self,
        version: &str,
        new_name: &str,
    ) -> Result<Configuration, BreadthError> {
        let source = self.get(version)?;
        self.create(source.cloned_as(new_name))
    }

    /// Pretty JSON array of the given versions, or of every configuration.
    pub fn export_json(&self, versions: Option<&[String]>) -> Result<String, BreadthError> {
        let configs = match versions {
            Some(versions) => versions
                .iter()
                .map(|v| self.get(v))
                .collect::<Result<Vec<_>, _>>()?,
            None => self.list(None)?,
        };
        Ok(serde_json::to_string_pretty(&configs)?)
    }

    /// Import one configuration or a list. Every import gets a fresh version
    /// and is never default. Nothing is stored unless all entries validate.
    pub fn import_json(&self, json: &str) -> Result<Vec<Configuration>, BreadthError> {
        let incoming = parse_import(json)?;

        let now = Utc::now();
        let prepared: Vec<Configuration> = incoming
            .into_iter()
            .map(|mut config| {
                config.version = generate_version(config.algorithm);
                config.is_default = false;
                config.created_at = now;
                config.updated_at = now;
                config
            })
            .collect();

        for config in &prepared {
            self.ensure_valid(config)?;
        }

        let _guard = self.lock()?;
        for config in &prepared {
            self.store.insert(config)?;
        }
        info!(count = prepared.len(), "imported configurations");
        Ok(prepared)
    }
}

/// Configurations in an import payload, as written.
pub fn parse_import(json: &str) -> Result<Vec<Configuration>, BreadthError> {
    Ok(match serde_json::from_str::<ImportPayload>(json)? {
        ImportPayload::Many(configs) => configs,
        ImportPayload::One(config) => vec![*config],
    })
}
