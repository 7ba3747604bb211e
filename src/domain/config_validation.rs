//! Settings validation.
//!
//! Validates the INI engine settings before anything is built from them.

use crate::domain::configuration::AlgorithmKind;
use crate::domain::error::BreadthError;
use crate::ports::config_port::ConfigPort;
use tracing::Level;

pub const MAX_LOOKBACK_DAYS: i64 = 5000;

pub fn validate_engine_settings(config: &dyn ConfigPort) -> Result<(), BreadthError> {
    validate_default_algorithm(config)?;
    validate_lookback(config)?;
    validate_store(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BreadthError {
    BreadthError::SettingsInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_default_algorithm(config: &dyn ConfigPort) -> Result<(), BreadthError> {
    match config.get_string("engine", "default_algorithm") {
        Some(s) => s
            .parse::<AlgorithmKind>()
            .map(|_| ())
            .map_err(|reason| invalid("engine", "default_algorithm", reason)),
        None => Ok(()),
    }
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), BreadthError> {
    let value = config.get_int("engine", "lookback_days", 60);
    if !(1..=MAX_LOOKBACK_DAYS).contains(&value) {
        return Err(invalid(
            "engine",
            "lookback_days",
            format!("lookback_days must be between 1 and {}", MAX_LOOKBACK_DAYS),
        ));
    }
    Ok(())
}

fn validate_store(config: &dyn ConfigPort) -> Result<(), BreadthError> {
    let backend = config.get_string_or("store", "backend", "memory");
    match backend.trim().to_lowercase().as_str() {
        "memory" => Ok(()),
        "sqlite" => {
            if config.get_string("sqlite", "path").is_none() {
                return Err(invalid(
                    "sqlite",
                    "path",
                    "path is required for the sqlite backend",
                ));
            }
            if config.get_int("sqlite", "pool_size", 4) < 1 {
                return Err(invalid("sqlite", "pool_size", "pool_size must be positive"));
            }
            Ok(())
        }
        other => Err(invalid(
            "store",
            "backend",
            format!("unknown backend '{}', expected memory or sqlite", other),
        )),
    }
}

fn validate_log_level(config: &dyn ConfigPort) -> Result<(), BreadthError> {
    match config.get_string("logging", "level") {
        Some(level) => level
            .trim()
            .parse::<Level>()
            .map(|_| ())
            .map_err(|_| invalid("logging", "level", format!("unknown log level '{}'", level))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn settings(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(content: &str, expected_key: &str) {
        match validate_engine_settings(&settings(content)) {
            Err(BreadthError::SettingsInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected SettingsInvalid for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn empty_settings_are_valid() {
        assert!(validate_engine_settings(&FileConfigAdapter::empty()).is_ok());
    }

    #[test]
    fn full_settings_are_valid() {
        let content = "[engine]\ndefault_algorithm = normalized\nlookback_days = 120\n\
                       [store]\nbackend = sqlite\n[sqlite]\npath = configs.db\n\
                       [logging]\nlevel = warn\n";
        assert!(validate_engine_settings(&settings(content)).is_ok());
    }

    #[test]
    fn unknown_algorithm() {
        assert_invalid("[engine]\ndefault_algorithm = astrology\n", "default_algorithm");
    }

    #[test]
    fn lookback_out_of_range() {
        assert_invalid("[engine]\nlookback_days = 0\n", "lookback_days");
        assert_invalid("[engine]\nlookback_days = 100000\n", "lookback_days");
    }

    #[test]
    fn sqlite_backend_requires_path() {
        assert_invalid("[store]\nbackend = sqlite\n", "path");
    }

    #[test]
    fn sqlite_pool_size_must_be_positive() {
        assert_invalid(
            "[store]\nbackend = sqlite\n[sqlite]\npath = x.db\npool_size = 0\n",
            "pool_size",
        );
    }

    #[test]
    fn unknown_backend() {
        assert_invalid("[store]\nbackend = redis\n", "backend");
    }

    #[test]
    fn unknown_log_level() {
        assert_invalid("[logging]\nlevel = loud\n", "level");
    }
}
