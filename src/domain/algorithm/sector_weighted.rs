//! Sector-weighted algorithm.
//!
//! Scores how broadly strength is spread across the eleven market sectors
//! and blends that with advance/decline and volume participation.

use super::{BreadthAlgorithm, Outcome, finish, prepare, ratio_score};
use crate::domain::breadth_record::{RawBreadthRecord, Sector};
use crate::domain::configuration::{AlgorithmKind, Configuration};
use crate::domain::error::BreadthError;
use crate::domain::result::BreadthResult;
use crate::domain::scoring::{self, CategoryScores};
use crate::domain::standardize::{
    ADVANCING_ISSUES, DECLINING_ISSUES, DOWN_VOLUME, FieldRule, STOCKS_DOWN_4PCT, STOCKS_UP_4PCT,
    SectorValues, StandardizedRecord, T2108, UP_VOLUME,
};
use crate::domain::statistics::{mean, momentum_ratio, std_dev};
use crate::domain::validation::ValidationResult;

/// Sectors that must be present for a calculation.
pub const MIN_SECTORS: usize = 6;

/// Rotation at or above which the phase is reported as a transition.
pub const TRANSITION_ROTATION: f64 = 60.0;

const LEADERS: usize = 3;
const MAX_Z: f64 = 3.0;

const REQUIRED: &[FieldRule] = &[ADVANCING_ISSUES, DECLINING_ISSUES];
const OPTIONAL: &[FieldRule] = &[UP_VOLUME, DOWN_VOLUME, STOCKS_UP_4PCT, STOCKS_DOWN_4PCT, T2108];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectorWeighted;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorMetrics {
    pub participation: f64,
    pub leadership: f64,
    pub rotation: f64,
    pub breadth: f64,
    pub momentum: f64,
}

impl SectorMetrics {
    pub fn composite(&self) -> f64 {
        0.25 * self.participation
            + 0.25 * self.leadership
            + 0.2 * self.breadth
            + 0.2 * self.momentum
            + 0.1 * (100.0 - self.rotation)
    }
}

/// Percentage of sectors with a positive reading.
pub fn participation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v > 0.0).count() as f64 / values.len() as f64 * 100.0
}

/// Mean of the three strongest sectors.
pub fn leadership(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top: Vec<f64> = sorted.into_iter().take(LEADERS).collect();
    scoring::clamp_score(mean(&top))
}

/// Dispersion across sectors: twice the population std dev, capped at 100.
pub fn rotation(values: &[f64]) -> f64 {
    (2.0 * std_dev(values, mean(values))).min(100.0)
}

/// Gini coefficient with negatives clamped to zero; 0 for an all-zero set.
pub fn gini(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let total: f64 = sorted.iter().sum();
    if sorted.is_empty() || total <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();
    (2.0 * weighted) / (n * total) - (n + 1.0) / n
}

pub fn breadth(values: &[f64]) -> f64 {
    (1.0 - gini(values)) * 100.0
}

/// Share of sectors at or above their trailing mean, penalized by how far
/// the current readings sit from that mean. `None` without sector history.
pub fn sector_momentum(current: &SectorValues, window: &[StandardizedRecord]) -> Option<f64> {
    let mut consistent = 0usize;
    let mut penalties = Vec::new();

    for (sector, value) in current.iter() {
        let trailing: Vec<f64> = window
            .iter()
            .filter_map(|r| r.sectors.as_ref().and_then(|s| s.get(sector)))
            .collect();
        if trailing.is_empty() {
            continue;
        }
        let trailing_mean = mean(&trailing);
        let sd = std_dev(&trailing, trailing_mean);
        let z = if sd > 1e-9 {
            (value - trailing_mean) / sd
        } else {
            0.0
        };
        if value >= trailing_mean {
            consistent += 1;
        }
        penalties.push(z.abs().min(MAX_Z) / MAX_Z);
    }

    if penalties.is_empty() {
        return None;
    }
    let consistency = consistent as f64 / penalties.len() as f64;
    Some(100.0 * consistency * (1.0 - 0.5 * mean(&penalties)))
}

pub fn sector_metrics(
    current: &SectorValues,
    window: &[StandardizedRecord],
    warnings: &mut Vec<String>,
) -> SectorMetrics {
    let values = current.values();
    let momentum = match sector_momentum(current, window) {
        Some(m) => m,
        None => {
            warnings.push("no sector history, using neutral sector momentum".to_string());
            50.0
        }
    };
    SectorMetrics {
        participation: participation(&values),
        leadership: leadership(&values),
        rotation: rotation(&values),
        breadth: breadth(&values),
        momentum,
    }
}

fn insufficient_sectors(found: usize) -> String {
    format!(
        "insufficient sector data: {} of {} sectors present, at least {} sectors required",
        found,
        Sector::ALL.len(),
        MIN_SECTORS
    )
}

impl BreadthAlgorithm for SectorWeighted {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::SectorWeighted
    }

    fn name(&self) -> &'static str {
        "Sector-Weighted"
    }

    fn required_fields(&self) -> &'static [FieldRule] {
        REQUIRED
    }

    fn optional_fields(&self) -> &'static [FieldRule] {
        OPTIONAL
    }

    fn validate(&self, raw: &RawBreadthRecord) -> ValidationResult {
        let mut result = crate::domain::validation::validate_record(raw, REQUIRED, OPTIONAL);
        let found = raw.sector_count();
        if found < MIN_SECTORS {
            result.push_error(insufficient_sectors(found));
        }
        result
    }

    fn calculate(
        &self,
        raw: &RawBreadthRecord,
        config: &Configuration,
        history: &[RawBreadthRecord],
    ) -> Result<BreadthResult, BreadthError> {
        if raw.date.is_none() {
            return Err(BreadthError::MissingDate);
        }
        let found = raw.sector_count();
        if found < MIN_SECTORS {
            return Err(BreadthError::InsufficientSectorData {
                found,
                required: MIN_SECTORS,
            });
        }

        let mut prepared = prepare(self, raw, config, history)?;
        let mut warnings = Vec::new();
        let current = &prepared.current;

        let threshold = config.indicators.sector_count_threshold;
        if threshold > found {
            warnings.push(format!(
                "only {} sectors present, configured threshold is {}",
                found, threshold
            ));
        }

        let metrics = match &current.sectors {
            Some(sectors) => sector_metrics(sectors, &prepared.window, &mut warnings),
            None => {
                return Err(BreadthError::InsufficientSectorData {
                    found: 0,
                    required: MIN_SECTORS,
                });
            }
        };

        let ad = ratio_score(
            current.advance_decline_ratio(),
            50.0,
            "no advance/decline data, using neutral score",
            &mut warnings,
        );
        let volume = ratio_score(
            current.volume_ratio(),
            ad,
            "up/down volume missing, using advance/decline score",
            &mut warnings,
        );
        let movers = ratio_score(
            current.mover_ratio(),
            ad,
            "4% movers missing, using advance/decline score",
            &mut warnings,
        );

        let categories = CategoryScores {
            primary: ad,
            secondary: 0.5 * volume + 0.5 * movers,
            reference: scoring::clamp_score(current.t2108),
            sector: scoring::clamp_score(metrics.composite()),
        };
        let (raw_score, components) = scoring::combine(&categories, &config.weights);
        let raw_score = scoring::clamp_score(raw_score);
        let normalized = scoring::scale(raw_score, &config.scaling);

        let momentum = momentum_ratio(
            current,
            &prepared.window,
            config.indicators.momentum_lookback_days,
        );

        let t = &config.market_conditions;
        let position = scoring::position(normalized, &config.scaling);
        let transition = metrics.rotation >= TRANSITION_ROTATION
            && position > t.strong_bear
            && position < t.strong_bull;

        let mut outcome = Outcome::standard(raw_score, normalized, components, momentum, config);
        outcome.transition = transition;
        prepared.warnings.extend(warnings);
        Ok(finish(self.kind(), prepared, config, outcome))
    }
}
