//! Weighting, scaling and confidence shared by every algorithm.

use crate::domain::configuration::{Normalization, Scaling, Weights};
use crate::domain::result::Components;

/// Confidence lost per warning.
pub const WARNING_PENALTY: f64 = 0.05;

/// Category scores, each on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryScores {
    pub primary: f64,
    pub secondary: f64,
    pub reference: f64,
    pub sector: f64,
}

/// Weighted mean of the categories and each category's contribution.
/// Non-positive total weight falls back to equal weights.
pub fn combine(scores: &CategoryScores, weights: &Weights) -> (f64, Components) {
    let weights = if weights.total() > 0.0 {
        *weights
    } else {
        Weights::new(0.25, 0.25, 0.25, 0.25)
    };
    let total = weights.total();
    let components = Components {
        primary: weights.primary * scores.primary / total,
        secondary: weights.secondary * scores.secondary / total,
        reference: weights.reference * scores.reference / total,
        sector: weights.sector * scores.sector / total,
    };
    (components.total(), components)
}

/// Map a raw 0–100 score into `[min_score, max_score]`.
pub fn scale(raw: f64, scaling: &Scaling) -> f64 {
    let raw = clamp_score(raw);
    let (min, max) = (scaling.min_score, scaling.max_score);
    let span = max - min;
    let scaled = match scaling.normalization {
        Normalization::Linear => min + raw / 100.0 * span,
        Normalization::Logarithmic => min + (1.0 + raw).ln() / 101f64.ln() * span,
        Normalization::Sigmoid => min + span / (1.0 + (-(raw - 50.0) / 10.0).exp()),
    };
    scaled.clamp(min.min(max), max.max(min))
}

/// Position of a scaled score within `[min_score, max_score]`, on 0–100.
pub fn position(score: f64, scaling: &Scaling) -> f64 {
    let span = scaling.max_score - scaling.min_score;
    if span <= 0.0 {
        return clamp_score(score);
    }
    clamp_score((score - scaling.min_score) / span * 100.0)
}

pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 50.0;
    }
    value.clamp(0.0, 100.0)
}

/// Confidence from data quality (0–100) less a penalty per warning, never
/// below a tenth of the data-quality base.
pub fn confidence(data_quality: f64, warnings: usize) -> f64 {
    let base = (data_quality / 100.0).clamp(0.0, 1.0);
    let penalized = base - WARNING_PENALTY * warnings as f64;
    penalized.max(base * 0.1).clamp(0.0, 1.0)
}

/// Points for `ratio` (0–1) on a budget of `budget` points.
pub fn points(ratio: f64, budget: f64) -> f64 {
    ratio.clamp(0.0, 1.0) * budget
}
