//! Six-factor algorithm.
//!
//! Fixed point budgets per factor (100 points in total):
//!
//! | factor            | points |
//! |-------------------|--------|
//! | advance/decline   | 25     |
//! | new highs/lows    | 20     |
//! | up/down volume    | 20     |
//! | 4% movers         | 15     |
//! | T2108             | 10     |
//! | momentum          | 10     |
//!
//! Points are grouped into the four weighted categories: primary (A/D, H/L,
//! volume), secondary (movers, momentum), reference (T2108) and sector.

use super::{BreadthAlgorithm, Outcome, finish, prepare};
use crate::domain::breadth_record::RawBreadthRecord;
use crate::domain::configuration::{AlgorithmKind, Configuration};
use crate::domain::error::BreadthError;
use crate::domain::result::BreadthResult;
use crate::domain::scoring::{self, CategoryScores, points};
use crate::domain::standardize::{
    ADVANCING_ISSUES, DECLINING_ISSUES, DOWN_VOLUME, FieldRule, NEW_HIGHS, NEW_LOWS,
    STOCKS_DOWN_4PCT, STOCKS_UP_4PCT, StandardizedRecord, T2108, UP_VOLUME,
};
use crate::domain::statistics::momentum_ratio;

pub const AD_POINTS: f64 = 25.0;
pub const HL_POINTS: f64 = 20.0;
pub const VOLUME_POINTS: f64 = 20.0;
pub const MOVER_POINTS: f64 = 15.0;
pub const T2108_POINTS: f64 = 10.0;
pub const MOMENTUM_POINTS: f64 = 10.0;

/// Points awarded when momentum cannot be computed.
pub const NEUTRAL_MOMENTUM_POINTS: f64 = 5.0;

/// Sector category score when the record carries no sector data.
pub const NEUTRAL_SECTOR_SCORE: f64 = 50.0;

const REQUIRED: &[FieldRule] = &[ADVANCING_ISSUES, DECLINING_ISSUES];
const OPTIONAL: &[FieldRule] = &[
    NEW_HIGHS,
    NEW_LOWS,
    UP_VOLUME,
    DOWN_VOLUME,
    STOCKS_UP_4PCT,
    STOCKS_DOWN_4PCT,
    T2108,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SixFactor;

/// Per-factor points plus the ratios they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorBreakdown {
    pub ad_ratio: f64,
    pub hl_ratio: f64,
    pub volume_ratio: f64,
    pub mover_ratio: f64,
    pub ad_points: f64,
    pub hl_points: f64,
    pub volume_points: f64,
    pub mover_points: f64,
    pub t2108_points: f64,
    pub momentum_points: f64,
    pub momentum_ratio: Option<f64>,
    pub sector_average: Option<f64>,
}

impl FactorBreakdown {
    pub fn categories(&self) -> CategoryScores {
        CategoryScores {
            primary: (self.ad_points + self.hl_points + self.volume_points)
                / (AD_POINTS + HL_POINTS + VOLUME_POINTS)
                * 100.0,
            secondary: (self.mover_points + self.momentum_points)
                / (MOVER_POINTS + MOMENTUM_POINTS)
                * 100.0,
            reference: self.t2108_points / T2108_POINTS * 100.0,
            sector: self
                .sector_average
                .map(scoring::clamp_score)
                .unwrap_or(NEUTRAL_SECTOR_SCORE),
        }
    }

    pub fn total_points(&self) -> f64 {
        self.ad_points
            + self.hl_points
            + self.volume_points
            + self.mover_points
            + self.t2108_points
            + self.momentum_points
    }
}

/// Compute every factor, pushing a warning for each fallback taken.
pub fn factor_breakdown(
    current: &StandardizedRecord,
    window: &[StandardizedRecord],
    lookback_days: usize,
    warnings: &mut Vec<String>,
) -> FactorBreakdown {
    let ad_ratio = match current.advance_decline_ratio() {
        Some(r) => r,
        None => {
            warnings.push("no advance/decline data, using neutral ratio 0.5".to_string());
            0.5
        }
    };
    let ad_points = points(ad_ratio, AD_POINTS);
    let ad_fallback = ad_points * HL_POINTS / AD_POINTS;

    let (hl_ratio, hl_points) = match current.high_low_ratio() {
        Some(r) => (r, points(r, HL_POINTS)),
        None => {
            warnings.push("new highs/lows missing, using advance/decline ratio".to_string());
            (ad_ratio, ad_fallback)
        }
    };

    let (volume_ratio, volume_points) = match current.volume_ratio() {
        Some(r) => (r, points(r, VOLUME_POINTS)),
        None => {
            warnings.push("up/down volume missing, using advance/decline ratio".to_string());
            (ad_ratio, ad_points * VOLUME_POINTS / AD_POINTS)
        }
    };

    let mover_ratio = match current.mover_ratio() {
        Some(r) => r,
        None => {
            warnings.push("4% movers missing, using advance/decline ratio".to_string());
            ad_ratio
        }
    };
    let mover_points = points(mover_ratio, MOVER_POINTS);

    let t2108_points = points(current.t2108 / 100.0, T2108_POINTS);

    let momentum = momentum_ratio(current, window, lookback_days);
    let momentum_points = match momentum {
        Some(m) => m / (1.0 + m) * MOMENTUM_POINTS,
        None => {
            warnings.push(format!(
                "insufficient history for {}-day momentum, using neutral score",
                lookback_days
            ));
            NEUTRAL_MOMENTUM_POINTS
        }
    };

    FactorBreakdown {
        ad_ratio,
        hl_ratio,
        volume_ratio,
        mover_ratio,
        ad_points,
        hl_points,
        volume_points,
        mover_points,
        t2108_points,
        momentum_points,
        momentum_ratio: momentum,
        sector_average: current.sectors.as_ref().map(|s| s.average()),
    }
}

impl BreadthAlgorithm for SixFactor {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::SixFactor
    }

    fn name(&self) -> &'static str {
        "Six-Factor"
    }

    fn required_fields(&self) -> &'static [FieldRule] {
        REQUIRED
    }

    fn optional_fields(&self) -> &'static [FieldRule] {
        OPTIONAL
    }

    fn calculate(
        &self,
        raw: &RawBreadthRecord,
        config: &Configuration,
        history: &[RawBreadthRecord],
    ) -> Result<BreadthResult, BreadthError> {
        let mut prepared = prepare(self, raw, config, history)?;

        let breakdown = factor_breakdown(
            &prepared.current,
            &prepared.window,
            config.indicators.momentum_lookback_days,
            &mut prepared.warnings,
        );
        let (raw_score, components) = scoring::combine(&breakdown.categories(), &config.weights);
        let raw_score = scoring::clamp_score(raw_score);
        let normalized = scoring::scale(raw_score, &config.scaling);

        let outcome = Outcome::standard(
            raw_score,
            normalized,
            components,
            breakdown.momentum_ratio,
            config,
        );
        Ok(finish(self.kind(), prepared, config, outcome))
    }
}
