//! Breadth scoring engine.
//!
//! Resolves the configuration for a calculation (an explicit override, or the
//! stored default of the requested algorithm) and dispatches to the algorithm
//! it names. Bulk calculation scores each record against the records before it.

use crate::domain::algorithm::{Algorithm, BreadthAlgorithm};
use crate::domain::breadth_record::RawBreadthRecord;
use crate::domain::config_manager::ConfigManager;
use crate::domain::configuration::{AlgorithmKind, Configuration};
use crate::domain::error::BreadthError;
use crate::domain::result::BreadthResult;
use crate::ports::data_port::BreadthDataPort;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// A record the series calculation could not score.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub date: Option<NaiveDate>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SeriesOutcome {
    pub results: Vec<BreadthResult>,
    pub skipped: Vec<SkippedRecord>,
}

pub struct BreadthEngine {
    configs: ConfigManager,
}

impl BreadthEngine {
    pub fn new(configs: ConfigManager) -> Self {
        Self { configs }
    }

    pub fn configs(&self) -> &ConfigManager {
        &self.configs
    }

    /// The configuration a calculation will use. An override must validate;
    /// its own algorithm takes precedence over `kind`.
    pub fn resolve_config(
        &self,
        kind: AlgorithmKind,
        override_config: Option<&Configuration>,
    ) -> Result<Configuration, BreadthError> {
        match override_config {
            Some(config) => {
                let validation = self.configs.validate(config);
                if !validation.valid {
                    return Err(BreadthError::ConfigInvalid {
                        version: config.version.clone(),
                        errors: validation.errors,
                    });
                }
                if config.algorithm != kind {
                    debug!(
                        requested = %kind,
                        configured = %config.algorithm,
                        "override configuration selects a different algorithm"
                    );
                }
                Ok(config.clone())
            }
            None => self.configs.get_default(kind),
        }
    }

    pub fn calculate(
        &self,
        raw: &RawBreadthRecord,
        history: &[RawBreadthRecord],
        kind: AlgorithmKind,
        override_config: Option<&Configuration>,
    ) -> Result<BreadthResult, BreadthError> {
        let config = self.resolve_config(kind, override_config)?;
        Algorithm::for_kind(config.algorithm).calculate(raw, &config, history)
    }

    /// Score every record, each against at most `lookback` records before it.
    /// Records that fail are reported as skipped; configuration problems abort.
    pub fn calculate_series(
        &self,
        records: &[RawBreadthRecord],
        kind: AlgorithmKind,
        override_config: Option<&Configuration>,
        lookback: usize,
    ) -> Result<SeriesOutcome, BreadthError> {
        let config = self.resolve_config(kind, override_config)?;
        let algorithm = Algorithm::for_kind(config.algorithm);

        let mut ordered: Vec<&RawBreadthRecord> = records.iter().collect();
        ordered.sort_by_key(|r| (r.date.is_none(), r.date));
        let dated: Vec<RawBreadthRecord> = ordered
            .iter()
            .filter(|r| r.date.is_some())
            .map(|r| (*r).clone())
            .collect();

        let mut outcome = SeriesOutcome::default();
        for raw in ordered {
            let position = dated.partition_point(|r| r.date < raw.date);
            let history = &dated[position.saturating_sub(lookback)..position];
            match algorithm.calculate(raw, &config, history) {
                Ok(result) => outcome.results.push(result),
                Err(e) => {
                    warn!(date = ?raw.date, algorithm = %config.algorithm, "skipping record: {}", e);
                    outcome.skipped.push(SkippedRecord {
                        date: raw.date,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            algorithm = %config.algorithm,
            version = %config.version,
            scored = outcome.results.len(),
            skipped = outcome.skipped.len(),
            "series calculation finished"
        );
        Ok(outcome)
    }

    /// Score the records of `source` dated within `[start, end]`, using earlier
    /// records in the source as history.
    pub fn calculate_range(
        &self,
        source: &dyn BreadthDataPort,
        start: NaiveDate,
        end: NaiveDate,
        kind: AlgorithmKind,
        override_config: Option<&Configuration>,
        lookback: usize,
    ) -> Result<SeriesOutcome, BreadthError> {
        let Some((first, _, _)) = source.get_data_range()? else {
            return Ok(SeriesOutcome::default());
        };
        let records = source.fetch_records(first.min(start), end)?;
        let mut outcome = self.calculate_series(&records, kind, override_config, lookback)?;
        outcome.results.retain(|r| r.date >= start);
        outcome
            .skipped
            .retain(|s| s.date.is_some_and(|d| d >= start));
        Ok(outcome)
    }
}
