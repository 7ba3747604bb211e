//! Scoring configurations.
//!
//! A [`Configuration`] is a versioned, named bundle of category weights,
//! scaling parameters, indicator parameters and market-condition thresholds.
//! Only the custom algorithm uses the formula and parameter map.

use crate::domain::error::BreadthError;
use crate::domain::formula_eval::{BUILTIN_VARIABLES, validate_with_dummy_context};
use crate::domain::validation::ConfigValidation;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const MAX_TOTAL_WEIGHT: f64 = 1.2;
pub const MIN_TOTAL_WEIGHT: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    SixFactor,
    Normalized,
    SectorWeighted,
    Custom,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 4] = [
        AlgorithmKind::SixFactor,
        AlgorithmKind::Normalized,
        AlgorithmKind::SectorWeighted,
        AlgorithmKind::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmKind::SixFactor => "six_factor",
            AlgorithmKind::Normalized => "normalized",
            AlgorithmKind::SectorWeighted => "sector_weighted",
            AlgorithmKind::Custom => "custom",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "six_factor" | "sixfactor" => Ok(AlgorithmKind::SixFactor),
            "normalized" | "normalized_statistical" => Ok(AlgorithmKind::Normalized),
            "sector_weighted" | "sector" => Ok(AlgorithmKind::SectorWeighted),
            "custom" | "custom_formula" => Ok(AlgorithmKind::Custom),
            other => Err(format!("unknown algorithm: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub primary: f64,
    pub secondary: f64,
    pub reference: f64,
    pub sector: f64,
}

impl Weights {
    pub fn new(primary: f64, secondary: f64, reference: f64, sector: f64) -> Self {
        Self {
            primary,
            secondary,
            reference,
            sector,
        }
    }

    pub fn total(&self) -> f64 {
        self.primary + self.secondary + self.reference + self.sector
    }

    pub fn as_array(&self) -> [(&'static str, f64); 4] {
        [
            ("primary", self.primary),
            ("secondary", self.secondary),
            ("reference", self.reference),
            ("sector", self.sector),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    Linear,
    Logarithmic,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub min_score: f64,
    pub max_score: f64,
    pub normalization: Normalization,
    pub confidence_threshold: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            max_score: 100.0,
            normalization: Normalization::Linear,
            confidence_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub t2108_threshold: f64,
    pub sector_count_threshold: usize,
    pub momentum_lookback_days: usize,
    pub volatility_adjustment: bool,
}

impl Default for Indicators {
    fn default() -> Self {
        Self {
            t2108_threshold: 50.0,
            sector_count_threshold: 6,
            momentum_lookback_days: 5,
            volatility_adjustment: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketThresholds {
    pub strong_bear: f64,
    pub bear: f64,
    pub bull: f64,
    pub strong_bull: f64,
}

impl Default for MarketThresholds {
    fn default() -> Self {
        Self {
            strong_bear: 20.0,
            bear: 35.0,
            bull: 65.0,
            strong_bull: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub algorithm: AlgorithmKind,
    pub weights: Weights,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub indicators: Indicators,
    #[serde(default)]
    pub market_conditions: MarketThresholds,
    #[serde(default)]
    pub custom_formula: Option<String>,
    #[serde(default)]
    pub custom_parameters: BTreeMap<String, f64>,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Configuration {
    /// A fresh, non-default configuration with the algorithm's standard
    /// parameters.
    pub fn new(algorithm: AlgorithmKind, name: impl Into<String>) -> Self {
        let now = Utc::now();
        let (weights, normalization, volatility_adjustment) = match algorithm {
            AlgorithmKind::SixFactor => (Weights::new(0.4, 0.35, 0.25, 0.0), Normalization::Linear, false),
            AlgorithmKind::Normalized => (Weights::new(0.4, 0.35, 0.25, 0.0), Normalization::Sigmoid, true),
            AlgorithmKind::SectorWeighted => (Weights::new(0.3, 0.2, 0.1, 0.4), Normalization::Linear, false),
            AlgorithmKind::Custom => (Weights::new(0.4, 0.35, 0.25, 0.0), Normalization::Linear, false),
        };
        let custom_formula = match algorithm {
            AlgorithmKind::Custom => Some("(primary * 0.4) + (secondary * 0.35) + (reference * 0.25)".to_string()),
            _ => None,
        };
        Self {
            version: generate_version(algorithm),
            name: name.into(),
            description: String::new(),
            algorithm,
            weights,
            scaling: Scaling {
                normalization,
                ..Scaling::default()
            },
            indicators: Indicators {
                volatility_adjustment,
                ..Indicators::default()
            },
            market_conditions: MarketThresholds::default(),
            custom_formula,
            custom_parameters: BTreeMap::new(),
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy under a new name and version; never default.
    pub fn cloned_as(&self, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: generate_version(self.algorithm),
            name: name.into(),
            is_default: false,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<String, BreadthError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, BreadthError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `{algorithm}_{unix_millis}_{9 lowercase alphanumerics}`.
pub fn generate_version(algorithm: AlgorithmKind) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}_{}_{}", algorithm, Utc::now().timestamp_millis(), suffix)
}

/// The built-in default configuration for every algorithm.
pub fn default_configurations() -> Vec<Configuration> {
    AlgorithmKind::ALL
        .iter()
        .map(|kind| {
            let mut config = Configuration::new(*kind, default_name(*kind));
            config.description = default_description(*kind).to_string();
            config.is_default = true;
            config
        })
        .collect()
}

fn default_name(kind: AlgorithmKind) -> &'static str {
    match kind {
        AlgorithmKind::SixFactor => "Six-Factor Default",
        AlgorithmKind::Normalized => "Normalized Statistical Default",
        AlgorithmKind::SectorWeighted => "Sector-Weighted Default",
        AlgorithmKind::Custom => "Custom Formula Default",
    }
}

fn default_description(kind: AlgorithmKind) -> &'static str {
    match kind {
        AlgorithmKind::SixFactor => "Fixed point budgets across six breadth factors",
        AlgorithmKind::Normalized => "Z-scores and percentiles against the trailing distribution",
        AlgorithmKind::SectorWeighted => "Sector participation, leadership and rotation blended with breadth",
        AlgorithmKind::Custom => "User formula over component scores and ratios",
    }
}

/// Structural checks shared by all algorithms.
pub fn validate_configuration(config: &Configuration) -> ConfigValidation {
    let mut result = validate_parameters(config);
    validate_formula(config, &mut result);
    result
}

/// Weight, scaling, threshold and lookback invariants, without the formula
/// dry run. Formula failures at calculation time fall back instead.
pub fn validate_parameters(config: &Configuration) -> ConfigValidation {
    let mut result = ConfigValidation::new();

    validate_weights(config, &mut result);
    validate_scaling(config, &mut result);
    validate_thresholds(config, &mut result);

    if config.indicators.momentum_lookback_days < 1 {
        result.error("momentum_lookback_days must be at least 1");
    }
    result
}

fn validate_weights(config: &Configuration, result: &mut ConfigValidation) {
    for (name, weight) in config.weights.as_array() {
        if !(0.0..=1.0).contains(&weight) {
            result.error(format!("{} weight must be between 0 and 1, got {}", name, weight));
        }
    }
    let total = config.weights.total();
    if total > MAX_TOTAL_WEIGHT {
        result.error(format!(
            "total weight {:.2} exceeds maximum {:.1}",
            total, MAX_TOTAL_WEIGHT
        ));
    } else if total < MIN_TOTAL_WEIGHT {
        result.warning(format!(
            "total weight {:.2} is below {:.1}",
            total, MIN_TOTAL_WEIGHT
        ));
    }
}

fn validate_scaling(config: &Configuration, result: &mut ConfigValidation) {
    let scaling = &config.scaling;
    if scaling.min_score >= scaling.max_score {
        result.error("min_score must be less than max_score");
    }
    if !(0.0..=1.0).contains(&scaling.confidence_threshold) {
        result.error("confidence_threshold must be between 0 and 1");
    }
}

fn validate_thresholds(config: &Configuration, result: &mut ConfigValidation) {
    let t = &config.market_conditions;
    if !(t.strong_bear < t.bear && t.bear < t.bull && t.bull < t.strong_bull) {
        result.error("market condition thresholds must be strictly ascending: strong_bear < bear < bull < strong_bull");
    }
}

fn validate_formula(config: &Configuration, result: &mut ConfigValidation) {
    for name in config.custom_parameters.keys() {
        if BUILTIN_VARIABLES.contains(&name.as_str()) {
            result.error(format!("custom parameter '{}' shadows a built-in variable", name));
        }
    }

    match &config.custom_formula {
        Some(formula) => {
            let params = config.custom_parameters.keys().map(String::as_str);
            if let Err(e) = validate_with_dummy_context(formula, params) {
                result.error(format!("invalid custom formula: {}", e));
            }
        }
        None if config.algorithm == AlgorithmKind::Custom => {
            result.error("custom algorithm requires a formula");
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_format() {
        let version = generate_version(AlgorithmKind::SectorWeighted);
        let rest = version.strip_prefix("sector_weighted_").unwrap();
        let (millis, suffix) = rest.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn versions_are_unique() {
        let a = generate_version(AlgorithmKind::SixFactor);
        let b = generate_version(AlgorithmKind::SixFactor);
        assert_ne!(a, b);
    }

    #[test]
    fn algorithm_kind_parse_and_display() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(kind.to_string().parse::<AlgorithmKind>().unwrap(), kind);
        }
        assert_eq!("Six-Factor".parse::<AlgorithmKind>().unwrap(), AlgorithmKind::SixFactor);
        assert!("magic".parse::<AlgorithmKind>().is_err());
    }

    #[test]
    fn defaults_are_valid_and_marked_default() {
        let defaults = default_configurations();
        assert_eq!(defaults.len(), 4);
        for config in &defaults {
            assert!(config.is_default);
            let result = validate_configuration(config);
            assert!(result.valid, "{}: {:?}", config.algorithm, result.errors);
            assert!(result.warnings.is_empty());
        }
    }

    #[test]
    fn weights_summing_to_2_7_fail() {
        let mut config = Configuration::new(AlgorithmKind::SixFactor, "heavy");
        config.weights = Weights::new(0.9, 0.9, 0.9, 0.0);
        let result = validate_configuration(&config);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("exceeds maximum")));
    }

    #[test]
    fn weights_summing_to_one_pass() {
        let mut config = Configuration::new(AlgorithmKind::SixFactor, "balanced");
        config.weights = Weights::new(0.4, 0.35, 0.25, 0.0);
        assert!(validate_configuration(&config).valid);
    }

    #[test]
    fn light_weights_only_warn() {
        let mut config = Configuration::new(AlgorithmKind::SixFactor, "light");
        config.weights = Weights::new(0.2, 0.2, 0.2, 0.0);
        let result = validate_configuration(&config);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn individual_weight_out_of_range() {
        let mut config = Configuration::new(AlgorithmKind::SixFactor, "negative");
        config.weights = Weights::new(1.1, -0.1, 0.0, 0.0);
        let result = validate_configuration(&config);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn scaling_and_threshold_errors() {
        let mut config = Configuration::new(AlgorithmKind::SixFactor, "broken");
        config.scaling.min_score = 100.0;
        config.scaling.max_score = 0.0;
        config.scaling.confidence_threshold = 1.5;
        config.market_conditions.bear = 70.0;
        config.indicators.momentum_lookback_days = 0;
        let result = validate_configuration(&config);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 4);
    }

    #[test]
    fn parameter_checks_skip_the_formula() {
        let mut config = Configuration::new(AlgorithmKind::Custom, "broken formula");
        config.custom_formula = Some("primary / (reference - reference)".into());
        assert!(!validate_configuration(&config).valid);
        assert!(validate_parameters(&config).valid);

        config.weights = Weights::new(0.9, 0.9, 0.9, 0.0);
        assert!(!validate_parameters(&config).valid);
    }

    #[test]
    fn custom_requires_formula() {
        let mut config = Configuration::new(AlgorithmKind::Custom, "empty");
        config.custom_formula = None;
        let result = validate_configuration(&config);
        assert_eq!(result.errors, vec!["custom algorithm requires a formula".to_string()]);
    }

    #[test]
    fn unsafe_formula_rejected() {
        let mut config = Configuration::new(AlgorithmKind::Custom, "evil");
        config.custom_formula = Some("process.exit(1)".into());
        let result = validate_configuration(&config);
        assert!(!result.valid);
        assert!(result.errors[0].contains("process"));
    }

    #[test]
    fn deeply_nested_formula_is_invalid() {
        let mut config = Configuration::new(AlgorithmKind::Custom, "nested");
        config.custom_formula = Some(format!(
            "{}primary{}",
            "(".repeat(10_000),
            ")".repeat(10_000)
        ));
        let result = validate_configuration(&config);
        assert!(!result.valid);
        assert!(result.errors[0].starts_with("invalid custom formula"));

        config.custom_formula = Some(format!("{}primary{}", "(".repeat(80), ")".repeat(80)));
        assert!(!validate_configuration(&config).valid);
    }

    #[test]
    fn formula_parameters_are_known_during_dry_run() {
        let mut config = Configuration::new(AlgorithmKind::Custom, "boosted");
        config.custom_formula = Some("primary * boost".into());
        assert!(!validate_configuration(&config).valid);
        config.custom_parameters.insert("boost".into(), 1.1);
        assert!(validate_configuration(&config).valid);
    }

    #[test]
    fn parameter_shadowing_builtin_rejected() {
        let mut config = Configuration::new(AlgorithmKind::Custom, "shadow");
        config.custom_parameters.insert("primary".into(), 1.0);
        let result = validate_configuration(&config);
        assert!(result.errors.iter().any(|e| e.contains("shadows")));
    }

    #[test]
    fn clone_gets_fresh_identity() {
        let mut original = Configuration::new(AlgorithmKind::Normalized, "base");
        original.is_default = true;
        let copy = original.cloned_as("copy");
        assert_ne!(copy.version, original.version);
        assert_eq!(copy.name, "copy");
        assert!(!copy.is_default);
        assert_eq!(copy.weights, original.weights);
        assert_eq!(copy.scaling, original.scaling);
    }

    #[test]
    fn json_round_trip() {
        let config = Configuration::new(AlgorithmKind::SectorWeighted, "json");
        let json = config.to_json().unwrap();
        assert_eq!(Configuration::from_json(&json).unwrap(), config);
    }
}
