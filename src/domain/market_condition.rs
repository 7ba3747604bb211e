//! Market-condition classification.
//!
//! Pure functions of the final score, the thresholds and the momentum ratio.

use crate::domain::configuration::MarketThresholds;
use serde::{Deserialize, Serialize};

/// Neutral midpoint of the 0–100 scale.
pub const CENTER: f64 = 50.0;

const UP_MOMENTUM: f64 = 1.1;
const DOWN_MOMENTUM: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Bull,
    Neutral,
    Bear,
    Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Up,
    Down,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketCondition {
    pub phase: Phase,
    pub strength: Strength,
    pub trend_direction: TrendDirection,
    pub confidence_level: f64,
}

pub fn classify_phase(score: f64, thresholds: &MarketThresholds) -> Phase {
    if score >= thresholds.bull {
        Phase::Bull
    } else if score <= thresholds.bear {
        Phase::Bear
    } else {
        Phase::Neutral
    }
}

pub fn classify_strength(score: f64, center: f64) -> Strength {
    let distance = (score - center).abs();
    if distance >= 35.0 {
        Strength::Extreme
    } else if distance >= 20.0 {
        Strength::Strong
    } else if distance >= 10.0 {
        Strength::Moderate
    } else {
        Strength::Weak
    }
}

pub fn classify_trend(score: f64, center: f64, momentum: Option<f64>) -> TrendDirection {
    match momentum {
        Some(m) if m > UP_MOMENTUM && score > center => TrendDirection::Up,
        Some(m) if m < DOWN_MOMENTUM && score < center => TrendDirection::Down,
        _ => TrendDirection::Sideways,
    }
}

pub fn confidence_level(confidence: f64, threshold: f64) -> f64 {
    if confidence >= threshold || threshold <= 0.0 {
        confidence
    } else {
        confidence * confidence / threshold
    }
}

/// Classify with strength and trend measured from `center`.
pub fn classify_around(
    score: f64,
    center: f64,
    thresholds: &MarketThresholds,
    momentum: Option<f64>,
    confidence: f64,
    confidence_threshold: f64,
) -> MarketCondition {
    MarketCondition {
        phase: classify_phase(score, thresholds),
        strength: classify_strength(score, center),
        trend_direction: classify_trend(score, center, momentum),
        confidence_level: confidence_level(confidence, confidence_threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn phase_boundaries_are_inclusive() {
        let t = MarketThresholds::default();
        assert_eq!(classify_phase(65.0, &t), Phase::Bull);
        assert_eq!(classify_phase(64.9, &t), Phase::Neutral);
        assert_eq!(classify_phase(35.0, &t), Phase::Bear);
        assert_eq!(classify_phase(35.1, &t), Phase::Neutral);
    }

    #[test]
    fn strength_by_distance() {
        assert_eq!(classify_strength(50.0, CENTER), Strength::Weak);
        assert_eq!(classify_strength(60.0, CENTER), Strength::Moderate);
        assert_eq!(classify_strength(30.0, CENTER), Strength::Strong);
        assert_eq!(classify_strength(85.0, CENTER), Strength::Extreme);
        assert_eq!(classify_strength(85.0, 60.0), Strength::Strong);
    }

    #[test]
    fn trend_requires_agreement() {
        assert_eq!(classify_trend(70.0, CENTER, Some(1.5)), TrendDirection::Up);
        assert_eq!(classify_trend(40.0, CENTER, Some(1.5)), TrendDirection::Sideways);
        assert_eq!(classify_trend(30.0, CENTER, Some(0.5)), TrendDirection::Down);
        assert_eq!(classify_trend(30.0, CENTER, None), TrendDirection::Sideways);
    }

    #[test]
    fn confidence_level_penalizes_below_threshold() {
        assert_relative_eq!(confidence_level(0.8, 0.7), 0.8);
        assert_relative_eq!(confidence_level(0.35, 0.7), 0.175);
        assert_relative_eq!(confidence_level(0.3, 0.0), 0.3);
    }

    #[test]
    fn phase_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Phase::Transition).unwrap(), "\"TRANSITION\"");
    }
}
