//! Scoring configuration storage port trait.
//!
//! Keyed by configuration version. Implementations must be read-your-writes;
//! the configuration manager serializes writers.

use crate::domain::configuration::Configuration;
use crate::domain::error::BreadthError;

pub trait ConfigStorePort {
    fn get(&self, version: &str) -> Result<Option<Configuration>, BreadthError>;

    /// All configurations, ordered by version.
    fn list(&self) -> Result<Vec<Configuration>, BreadthError>;

    /// Fails when the version already exists.
    fn insert(&self, config: &Configuration) -> Result<(), BreadthError>;

    /// Fails when the version does not exist.
    fn update(&self, config: &Configuration) -> Result<(), BreadthError>;

    /// Returns whether a configuration was removed.
    fn delete(&self, version: &str) -> Result<bool, BreadthError>;
}
