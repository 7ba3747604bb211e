//! Normalized-statistical algorithm.
//!
//! Indicators are scored by where they fall in their own trailing
//! distribution rather than on fixed scales, and the market-condition
//! thresholds widen or narrow with realized volatility.

use super::{BreadthAlgorithm, Outcome, finish, prepare};
use crate::domain::breadth_record::RawBreadthRecord;
use crate::domain::configuration::{AlgorithmKind, Configuration, MarketThresholds, Normalization};
use crate::domain::error::BreadthError;
use crate::domain::result::BreadthResult;
use crate::domain::scoring::{self, CategoryScores};
use crate::domain::standardize::{
    ADVANCING_ISSUES, DECLINING_ISSUES, FieldRule, STOCKS_DOWN_4PCT, STOCKS_UP_4PCT, T2108,
};
use crate::domain::statistics::{
    HistoricalMetrics, MIN_HISTORY_SAMPLES, ad_ratio_samples, distribution, historical_metrics,
    momentum_ratio, percentile_rank,
};
use statrs::function::erf::erf;

/// Standard deviation the fixed thresholds are calibrated for.
pub const BASELINE_STD_DEV: f64 = 20.0;

/// Scale used to z-score T2108 around its neutral threshold.
pub const T2108_SCALE: f64 = 20.0;

const HIGH_VOLATILITY: f64 = 35.0;
const LOW_VOLATILITY: f64 = 5.0;
const HIGH_VOLATILITY_FACTOR: f64 = 0.8;
const LOW_VOLATILITY_FACTOR: f64 = 0.85;
const SHORT_HISTORY_FACTOR: f64 = 0.9;

const REQUIRED: &[FieldRule] = &[ADVANCING_ISSUES, DECLINING_ISSUES];
const OPTIONAL: &[FieldRule] = &[STOCKS_UP_4PCT, STOCKS_DOWN_4PCT, T2108];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizedStatistical;

/// Standard normal CDF of `z`, as a 0–100 percentile.
pub fn z_to_percentile(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2)) * 100.0
}

/// Percentile of `value` within `samples`. With a trusted distribution the
/// erf percentile of its z-score is averaged with its empirical rank; a
/// neutral distribution only has the erf percentile.
pub fn indicator_percentile(value: f64, samples: &[f64], metrics: &HistoricalMetrics) -> f64 {
    let from_z = z_to_percentile(metrics.z_score(value));
    if metrics.is_neutral() {
        return from_z;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    (from_z + percentile_rank(&sorted, value)) / 2.0
}

/// Thresholds shifted by `(std_dev - 20) / 4`: bull thresholds up, bear
/// thresholds down.
pub fn adjusted_thresholds(base: &MarketThresholds, std_dev: f64) -> MarketThresholds {
    let adj = (std_dev - BASELINE_STD_DEV) / 4.0;
    MarketThresholds {
        strong_bear: base.strong_bear - adj,
        bear: base.bear - adj,
        bull: base.bull + adj,
        strong_bull: base.strong_bull + adj,
    }
}

/// Final score using the historical distribution for the non-linear modes.
pub fn normalize(raw: f64, config: &Configuration, metrics: &HistoricalMetrics) -> f64 {
    let scaling = &config.scaling;
    let (min, max) = (scaling.min_score, scaling.max_score);
    let z = metrics.z_score(raw);
    let unit = match scaling.normalization {
        Normalization::Linear => return scoring::scale(raw, scaling),
        Normalization::Sigmoid => 1.0 / (1.0 + (-z).exp()),
        Normalization::Logarithmic => {
            let centered = 50.0 + z.signum() * (1.0 + z.abs()).ln() * 20.0;
            scoring::clamp_score(centered) / 100.0
        }
    };
    (min + unit * (max - min)).clamp(min.min(max), max.max(min))
}

impl BreadthAlgorithm for NormalizedStatistical {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Normalized
    }

    fn name(&self) -> &'static str {
        "Normalized Statistical"
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
        let current = &prepared.current;
        let window = &prepared.window;
        let mut warnings = Vec::new();

        let ad_samples = ad_ratio_samples(window);
        let metrics = historical_metrics(window);

        let ad_percentile = match current.advance_decline_ratio() {
            Some(r) => indicator_percentile(r * 100.0, &ad_samples, &metrics),
            None => {
                warnings.push("no advance/decline data, using neutral percentile".to_string());
                50.0
            }
        };

        let mover_samples: Vec<f64> = window
            .iter()
            .filter_map(|r| r.mover_ratio())
            .map(|r| r * 100.0)
            .collect();
        let mover_metrics = distribution(&mover_samples);
        let mover_percentile = match current.mover_ratio() {
            Some(r) => indicator_percentile(r * 100.0, &mover_samples, &mover_metrics),
            None => {
                warnings.push("4% movers missing, using advance/decline percentile".to_string());
                ad_percentile
            }
        };

        let t2108_z = (current.t2108 - config.indicators.t2108_threshold) / T2108_SCALE;
        let t2108_percentile = z_to_percentile(t2108_z);

        let sector = current
            .sectors
            .as_ref()
            .map(|s| scoring::clamp_score(s.average()))
            .unwrap_or(50.0);

        let categories = CategoryScores {
            primary: ad_percentile,
            secondary: mover_percentile,
            reference: t2108_percentile,
            sector,
        };
        let (mut raw_score, mut components) = scoring::combine(&categories, &config.weights);

        if config.indicators.volatility_adjustment && metrics.std_dev > BASELINE_STD_DEV {
            let damp = BASELINE_STD_DEV / metrics.std_dev;
            let adjusted = 50.0 + (raw_score - 50.0) * damp;
            if raw_score != 0.0 {
                let ratio = adjusted / raw_score;
                components.primary *= ratio;
                components.secondary *= ratio;
                components.reference *= ratio;
                components.sector *= ratio;
            }
            raw_score = adjusted;
        }
        let raw_score = scoring::clamp_score(raw_score);
        let normalized = normalize(raw_score, config, &metrics);

        let mut confidence_factor = 1.0;
        if metrics.is_neutral() {
            warnings.push(format!(
                "insufficient history: {} of {} samples, using neutral distribution",
                metrics.samples, MIN_HISTORY_SAMPLES
            ));
            confidence_factor *= SHORT_HISTORY_FACTOR;
        }
        if metrics.std_dev > HIGH_VOLATILITY {
            warnings.push(format!(
                "extreme historical volatility: std dev {:.1}",
                metrics.std_dev
            ));
            confidence_factor *= HIGH_VOLATILITY_FACTOR;
        } else if metrics.std_dev < LOW_VOLATILITY {
            warnings.push(format!(
                "unusually low historical volatility: std dev {:.1}",
                metrics.std_dev
            ));
            confidence_factor *= LOW_VOLATILITY_FACTOR;
        }

        let momentum = momentum_ratio(current, window, config.indicators.momentum_lookback_days);
        if momentum.is_none() {
            warnings.push(format!(
                "insufficient history for {}-day momentum",
                config.indicators.momentum_lookback_days
            ));
        }

        let outcome = Outcome {
            raw_score,
            normalized_score: normalized,
            components,
            momentum,
            center: metrics.mean,
            thresholds: adjusted_thresholds(&config.market_conditions, metrics.std_dev),
            confidence_factor,
            transition: false,
        };
        prepared.warnings.extend(warnings);
        Ok(finish(self.kind(), prepared, config, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::configuration::Scaling;
    use crate::domain::market_condition::Strength;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn record(day: u32, advancing: f64, declining: f64) -> RawBreadthRecord {
        let mut raw = RawBreadthRecord::new(NaiveDate::from_ymd_opt(2024, 2, day).unwrap());
        raw.advancing_issues = Some(advancing);
        raw.declining_issues = Some(declining);
        raw.stocks_up_4pct = Some(advancing / 10.0);
        raw.stocks_down_4pct = Some(declining / 10.0);
        raw.t2108 = Some(50.0);
        raw
    }

    #[test]
    fn percentile_conversion() {
        assert_relative_eq!(z_to_percentile(0.0), 50.0, epsilon = 1e-9);
        assert_relative_eq!(z_to_percentile(1.0), 84.13447460685429, epsilon = 1e-6);
        assert_relative_eq!(z_to_percentile(-1.0), 15.865525393145708, epsilon = 1e-6);
    }

    #[test]
    fn indicator_percentile_blends_rank_with_trusted_history() {
        let samples: Vec<f64> = (0..20).map(|i| 40.0 + i as f64).collect();
        let metrics = distribution(&samples);

        let top = indicator_percentile(59.0, &samples, &metrics);
        let z_only = z_to_percentile(metrics.z_score(59.0));
        assert_relative_eq!(top, (z_only + 100.0) / 2.0, epsilon = 1e-9);

        let below_all = indicator_percentile(30.0, &samples, &metrics);
        assert_relative_eq!(
            below_all,
            z_to_percentile(metrics.z_score(30.0)) / 2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn indicator_percentile_uses_erf_only_on_short_history() {
        let samples = [55.0, 60.0, 65.0];
        let metrics = distribution(&samples);
        assert!(metrics.is_neutral());
        assert_relative_eq!(
            indicator_percentile(70.0, &samples, &metrics),
            z_to_percentile(1.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn thresholds_shift_with_volatility() {
        let base = MarketThresholds::default();
        let wide = adjusted_thresholds(&base, 28.0);
        assert_relative_eq!(wide.bull, 67.0);
        assert_relative_eq!(wide.strong_bull, 82.0);
        assert_relative_eq!(wide.bear, 33.0);
        assert_relative_eq!(wide.strong_bear, 18.0);
        assert_eq!(adjusted_thresholds(&base, 20.0), base);
    }

    #[test]
    fn sigmoid_normalization_uses_history() {
        let config = Configuration::new(AlgorithmKind::Normalized, "t");
        let metrics = HistoricalMetrics {
            mean: 60.0,
            std_dev: 10.0,
            ..HistoricalMetrics::NEUTRAL
        };
        assert_relative_eq!(normalize(60.0, &config, &metrics), 50.0);
        assert!(normalize(70.0, &config, &metrics) > 70.0);
    }

    #[test]
    fn logarithmic_normalization_is_bounded() {
        let mut config = Configuration::new(AlgorithmKind::Normalized, "t");
        config.scaling = Scaling {
            normalization: Normalization::Logarithmic,
            ..Scaling::default()
        };
        let metrics = HistoricalMetrics::NEUTRAL;
        assert_relative_eq!(normalize(50.0, &config, &metrics), 50.0);
        let high = normalize(100.0, &config, &metrics);
        assert!(high > 50.0 && high <= 100.0);
        let low = normalize(0.0, &config, &metrics);
        assert!(low < 50.0 && low >= 0.0);
    }

    #[test]
    fn short_history_lowers_confidence() {
        let config = Configuration::new(AlgorithmKind::Normalized, "t");
        let history: Vec<_> = (1..=12).map(|d| record(d, 1500.0 + d as f64 * 10.0, 1500.0)).collect();
        let current = record(20, 2000.0, 1000.0);

        let full = NormalizedStatistical.calculate(&current, &config, &history).unwrap();
        let short = NormalizedStatistical.calculate(&current, &config, &history[..3]).unwrap();
        assert!(short.confidence < full.confidence);
        assert!(short
            .metadata
            .warnings
            .iter()
            .any(|w| w.starts_with("insufficient history: 3 of 10")));
    }

    #[test]
    fn above_average_day_scores_above_mid() {
        let config = Configuration::new(AlgorithmKind::Normalized, "t");
        let history: Vec<_> = (1..=15)
            .map(|d| record(d, 1400.0 + (d % 5) as f64 * 50.0, 1600.0 - (d % 5) as f64 * 50.0))
            .collect();
        let result = NormalizedStatistical
            .calculate(&record(20, 2200.0, 800.0), &config, &history)
            .unwrap();
        assert!(result.normalized_score > 50.0);
        assert!(result.normalized_score <= 100.0);
        assert!(result.market_condition.strength >= Strength::Moderate);
    }
}
