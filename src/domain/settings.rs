//! Engine settings read from the INI file.

use crate::domain::config_validation::validate_engine_settings;
use crate::domain::configuration::AlgorithmKind;
use crate::domain::error::BreadthError;
use crate::ports::config_port::ConfigPort;
use tracing::Level;

pub const DEFAULT_LOOKBACK_DAYS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub default_algorithm: AlgorithmKind,
    /// History records supplied to each calculation.
    pub lookback_days: usize,
    pub store_backend: StoreBackend,
    pub log_level: Level,
    /// Colored log output.
    pub log_ansi: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_algorithm: AlgorithmKind::SixFactor,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            store_backend: StoreBackend::Memory,
            log_level: Level::INFO,
            log_ansi: true,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BreadthError> {
        validate_engine_settings(config)?;
        let defaults = Self::default();

        let default_algorithm = match config.get_string("engine", "default_algorithm") {
            Some(s) => s.parse().map_err(|reason| BreadthError::SettingsInvalid {
                section: "engine".into(),
                key: "default_algorithm".into(),
                reason,
            })?,
            None => defaults.default_algorithm,
        };

        let store_backend = match config
            .get_string("store", "backend")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            Some("sqlite") => StoreBackend::Sqlite,
            _ => StoreBackend::Memory,
        };

        let log_level = config
            .get_string("logging", "level")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.log_level);

        Ok(Self {
            default_algorithm,
            lookback_days: config.get_int("engine", "lookback_days", DEFAULT_LOOKBACK_DAYS as i64)
                as usize,
            store_backend,
            log_level,
            log_ansi: config.get_bool("logging", "ansi", defaults.log_ansi),
        })
    }
}
