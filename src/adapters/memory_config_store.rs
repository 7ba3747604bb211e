//! In-memory configuration store.

use crate::domain::configuration::Configuration;
use crate::domain::error::BreadthError;
use crate::ports::config_store_port::ConfigStorePort;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: Mutex<BTreeMap<String, Configuration>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Configuration>>, BreadthError> {
        self.configs.lock().map_err(|e| BreadthError::Storage {
            reason: format!("configuration store lock poisoned: {}", e),
        })
    }
}

impl ConfigStorePort for MemoryConfigStore {
    fn get(&self, version: &str) -> Result<Option<Configuration>, BreadthError> {
        Ok(self.lock()?.get(version).cloned())
    }

    fn list(&self) -> Result<Vec<Configuration>, BreadthError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn insert(&self, config: &Configuration) -> Result<(), BreadthError> {
        let mut configs = self.lock()?;
        if configs.contains_key(&config.version) {
            return Err(BreadthError::Storage {
                reason: format!("configuration {} already exists", config.version),
            });
        }
        configs.insert(config.version.clone(), config.clone());
        Ok(())
    }

    fn update(&self, config: &Configuration) -> Result<(), BreadthError> {
        let mut configs = self.lock()?;
        match configs.get_mut(&config.version) {
            Some(slot) => {
                *slot = config.clone();
                Ok(())
            }
            None => Err(BreadthError::ConfigNotFound {
                version: config.version.clone(),
            }),
        }
    }

    fn delete(&self, version: &str) -> Result<bool, BreadthError> {
        Ok(self.lock()?.remove(version).is_some())
    }
}
