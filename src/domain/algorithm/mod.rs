//! Scoring algorithms.
//!
//! Every algorithm implements [`BreadthAlgorithm`]; [`Algorithm`] is the
//! closed set dispatched by [`AlgorithmKind`]. Algorithms borrow their inputs
//! immutably and report degraded data as warnings, never as errors, apart
//! from a missing date and (sector-weighted) insufficient sector coverage.

pub mod custom_formula;
pub mod normalized;
pub mod sector_weighted;
pub mod six_factor;

pub use custom_formula::CustomFormula;
pub use normalized::NormalizedStatistical;
pub use sector_weighted::SectorWeighted;
pub use six_factor::SixFactor;

use crate::domain::breadth_record::RawBreadthRecord;
use crate::domain::configuration::{
    AlgorithmKind, Configuration, MarketThresholds, validate_configuration, validate_parameters,
};
use crate::domain::error::BreadthError;
use crate::domain::market_condition::{self, Phase};
use crate::domain::result::{BreadthResult, Components, ResultMetadata};
use crate::domain::scoring;
use crate::domain::standardize::{FieldRule, StandardizedRecord, standardize, trailing_window};
use crate::domain::validation::{ConfigValidation, ValidationResult, validate_record};
use chrono::NaiveDate;
use std::time::Instant;
use tracing::{debug, warn};

pub trait BreadthAlgorithm {
    fn kind(&self) -> AlgorithmKind;

    fn name(&self) -> &'static str;

    fn required_fields(&self) -> &'static [FieldRule];

    fn optional_fields(&self) -> &'static [FieldRule];

    fn validate(&self, raw: &RawBreadthRecord) -> ValidationResult {
        validate_record(raw, self.required_fields(), self.optional_fields())
    }

    fn validate_config(&self, config: &Configuration) -> ConfigValidation {
        validate_configuration(config)
    }

    fn calculate(
        &self,
        raw: &RawBreadthRecord,
        config: &Configuration,
        history: &[RawBreadthRecord],
    ) -> Result<BreadthResult, BreadthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    SixFactor(SixFactor),
    Normalized(NormalizedStatistical),
    SectorWeighted(SectorWeighted),
    Custom(CustomFormula),
}

impl Algorithm {
    pub fn for_kind(kind: AlgorithmKind) -> Self {
        match kind {
            AlgorithmKind::SixFactor => Algorithm::SixFactor(SixFactor),
            AlgorithmKind::Normalized => Algorithm::Normalized(NormalizedStatistical),
            AlgorithmKind::SectorWeighted => Algorithm::SectorWeighted(SectorWeighted),
            AlgorithmKind::Custom => Algorithm::Custom(CustomFormula),
        }
    }

    fn inner(&self) -> &dyn BreadthAlgorithm {
        match self {
            Algorithm::SixFactor(a) => a,
            Algorithm::Normalized(a) => a,
            Algorithm::SectorWeighted(a) => a,
            Algorithm::Custom(a) => a,
        }
    }
}

impl From<AlgorithmKind> for Algorithm {
    fn from(kind: AlgorithmKind) -> Self {
        Algorithm::for_kind(kind)
    }
}

impl BreadthAlgorithm for Algorithm {
    fn kind(&self) -> AlgorithmKind {
        self.inner().kind()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn required_fields(&self) -> &'static [FieldRule] {
        self.inner().required_fields()
    }

    fn optional_fields(&self) -> &'static [FieldRule] {
        self.inner().optional_fields()
    }

    fn validate(&self, raw: &RawBreadthRecord) -> ValidationResult {
        self.inner().validate(raw)
    }

    fn validate_config(&self, config: &Configuration) -> ConfigValidation {
        self.inner().validate_config(config)
    }

    fn calculate(
        &self,
        raw: &RawBreadthRecord,
        config: &Configuration,
        history: &[RawBreadthRecord],
    ) -> Result<BreadthResult, BreadthError> {
        self.inner().calculate(raw, config, history)
    }
}

/// Validated, standardized inputs for one calculation.
pub(crate) struct Prepared {
    pub date: NaiveDate,
    pub current: StandardizedRecord,
    pub window: Vec<StandardizedRecord>,
    pub warnings: Vec<String>,
    started: Instant,
}

/// Checks shared by every `calculate`: the date, the configuration's
/// parameter invariants, then the algorithm's record validation.
pub(crate) fn prepare(
    algorithm: &dyn BreadthAlgorithm,
    raw: &RawBreadthRecord,
    config: &Configuration,
    history: &[RawBreadthRecord],
) -> Result<Prepared, BreadthError> {
    let started = Instant::now();
    let date = raw.date.ok_or(BreadthError::MissingDate)?;

    let parameters = validate_parameters(config);
    if !parameters.valid {
        return Err(BreadthError::ConfigInvalid {
            version: config.version.clone(),
            errors: parameters.errors,
        });
    }

    let validation = algorithm.validate(raw);
    if !validation.is_valid {
        return Err(BreadthError::Validation {
            errors: validation.errors,
        });
    }

    Ok(Prepared {
        date,
        current: standardize(raw),
        window: trailing_window(Some(date), history),
        warnings: validation.warnings,
        started,
    })
}

/// Scores produced by an algorithm, ready to be classified.
pub(crate) struct Outcome {
    pub raw_score: f64,
    pub normalized_score: f64,
    pub components: Components,
    pub momentum: Option<f64>,
    pub center: f64,
    pub thresholds: MarketThresholds,
    pub confidence_factor: f64,
    pub transition: bool,
}

impl Outcome {
    /// Outcome with the configured thresholds, centered on 50.
    pub fn standard(
        raw_score: f64,
        normalized_score: f64,
        components: Components,
        momentum: Option<f64>,
        config: &Configuration,
    ) -> Self {
        Self {
            raw_score,
            normalized_score,
            components,
            momentum,
            center: market_condition::CENTER,
            thresholds: config.market_conditions,
            confidence_factor: 1.0,
            transition: false,
        }
    }
}

pub(crate) fn finish(
    kind: AlgorithmKind,
    prepared: Prepared,
    config: &Configuration,
    outcome: Outcome,
) -> BreadthResult {
    let Prepared {
        date,
        current,
        warnings,
        started,
        ..
    } = prepared;

    let confidence = (scoring::confidence(current.data_quality, warnings.len())
        * outcome.confidence_factor)
        .clamp(0.0, 1.0);

    let mut condition = market_condition::classify_around(
        scoring::position(outcome.normalized_score, &config.scaling),
        outcome.center,
        &outcome.thresholds,
        outcome.momentum,
        confidence,
        config.scaling.confidence_threshold,
    );
    if outcome.transition {
        condition.phase = Phase::Transition;
    }

    for warning in &warnings {
        warn!(algorithm = %kind, %date, "{}", warning);
    }
    debug!(
        algorithm = %kind,
        %date,
        score = outcome.raw_score,
        normalized = outcome.normalized_score,
        "breadth score calculated"
    );

    BreadthResult {
        date,
        score: outcome.raw_score,
        normalized_score: outcome.normalized_score,
        confidence,
        components: outcome.components,
        market_condition: condition,
        metadata: ResultMetadata {
            algorithm: kind,
            config_version: config.version.clone(),
            calculation_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            data_quality: current.data_quality,
            missing_fields: current.missing_fields,
            warnings,
        },
    }
}

/// `ratio` as a 0–100 score, or the fallback with a warning.
pub(crate) fn ratio_score(
    ratio: Option<f64>,
    fallback: f64,
    warning: &str,
    warnings: &mut Vec<String>,
) -> f64 {
    match ratio {
        Some(r) => r.clamp(0.0, 1.0) * 100.0,
        None => {
            warnings.push(warning.to_string());
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::configuration::{Scaling, Weights};

    #[test]
    fn dispatch_matches_kind() {
        for kind in AlgorithmKind::ALL {
            let algorithm = Algorithm::for_kind(kind);
            assert_eq!(algorithm.kind(), kind);
            assert!(!algorithm.name().is_empty());
            assert!(!algorithm.required_fields().is_empty());
        }
    }

    #[test]
    fn missing_date_is_a_hard_error_for_every_algorithm() {
        for kind in AlgorithmKind::ALL {
            let algorithm = Algorithm::from(kind);
            let config = Configuration::new(kind, "test");
            let err = algorithm
                .calculate(&RawBreadthRecord::default(), &config, &[])
                .unwrap_err();
            assert!(matches!(err, BreadthError::MissingDate), "{}", kind);
        }
    }

    fn strong_record() -> RawBreadthRecord {
        let mut raw = RawBreadthRecord::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        raw.advancing_issues = Some(2500.0);
        raw.declining_issues = Some(500.0);
        raw.new_highs = Some(300.0);
        raw.new_lows = Some(20.0);
        raw.up_volume = Some(4.0e9);
        raw.down_volume = Some(1.0e9);
        raw.stocks_up_4pct = Some(500.0);
        raw.stocks_down_4pct = Some(100.0);
        raw.t2108 = Some(75.0);
        raw
    }

    #[test]
    fn invalid_parameters_block_direct_calculation() {
        for kind in [AlgorithmKind::SixFactor, AlgorithmKind::Normalized, AlgorithmKind::Custom] {
            let mut config = Configuration::new(kind, "heavy");
            config.weights = Weights::new(0.9, 0.9, 0.9, 0.0);
            let err = Algorithm::for_kind(kind)
                .calculate(&strong_record(), &config, &[])
                .unwrap_err();
            assert!(matches!(err, BreadthError::ConfigInvalid { .. }), "{}", kind);
        }
    }

    #[test]
    fn phase_is_classified_on_the_position_within_the_scaled_range() {
        let mut config = Configuration::new(AlgorithmKind::SixFactor, "narrow");
        config.scaling = Scaling {
            min_score: 10.0,
            max_score: 20.0,
            ..Scaling::default()
        };
        let result = SixFactor.calculate(&strong_record(), &config, &[]).unwrap();
        assert!(result.normalized_score > 15.0 && result.normalized_score <= 20.0);
        assert_eq!(result.market_condition.phase, Phase::Bull);

        let unscaled = SixFactor
            .calculate(&strong_record(), &Configuration::new(AlgorithmKind::SixFactor, "full"), &[])
            .unwrap();
        assert_eq!(result.market_condition, unscaled.market_condition);
    }
}
