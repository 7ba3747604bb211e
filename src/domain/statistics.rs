//! Historical distribution metrics and momentum ratios.
//!
//! All functions take the trailing window newest first, as produced by
//! [`trailing_window`](crate::domain::standardize::trailing_window).

use crate::domain::standardize::StandardizedRecord;
use serde::{Deserialize, Serialize};

/// Minimum number of samples before a distribution is trusted.
pub const MIN_HISTORY_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMetrics {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p75: f64,
    pub samples: usize,
}

impl HistoricalMetrics {
    /// Neutral distribution used when history is too short.
    pub const NEUTRAL: HistoricalMetrics = HistoricalMetrics {
        mean: 50.0,
        std_dev: 20.0,
        min: 0.0,
        max: 100.0,
        p25: 35.0,
        p75: 65.0,
        samples: 0,
    };

    pub fn is_neutral(&self) -> bool {
        self.samples < MIN_HISTORY_SAMPLES
    }

    /// Standard score of `value`, with a degenerate deviation treated as 1.
    pub fn z_score(&self, value: f64) -> f64 {
        let sd = if self.std_dev > 1e-9 { self.std_dev } else { 1.0 };
        (value - self.mean) / sd
    }
}

/// Advance/decline ratios of the window on a 0–100 scale.
pub fn ad_ratio_samples(window: &[StandardizedRecord]) -> Vec<f64> {
    window
        .iter()
        .filter_map(|r| r.advance_decline_ratio())
        .map(|r| r * 100.0)
        .collect()
}

/// Distribution of advance/decline ratios (0–100 scale) over the window.
pub fn historical_metrics(window: &[StandardizedRecord]) -> HistoricalMetrics {
    distribution(&ad_ratio_samples(window))
}

/// Distribution metrics of arbitrary samples on a 0–100 scale.
pub fn distribution(values: &[f64]) -> HistoricalMetrics {
    if values.len() < MIN_HISTORY_SAMPLES {
        return HistoricalMetrics {
            samples: values.len(),
            ..HistoricalMetrics::NEUTRAL
        };
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mean = mean(&sorted);
    HistoricalMetrics {
        mean,
        std_dev: std_dev(&sorted, mean),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        p25: percentile(&sorted, 25.0),
        p75: percentile(&sorted, 75.0),
        samples: sorted.len(),
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around a precomputed mean.
pub fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Percentile `p` (0–100) of ascending `sorted`, linearly interpolated.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

/// Share of samples at or below `value`, as 0–100.
pub fn percentile_rank(sorted: &[f64], value: f64) -> f64 {
    if sorted.is_empty() {
        return 50.0;
    }
    let below = sorted.iter().filter(|v| **v <= value).count();
    below as f64 / sorted.len() as f64 * 100.0
}

/// Up/down 4%-mover ratio summed over the current record and the `days - 1`
/// most recent window entries. `None` when the window is too short.
pub fn momentum_ratio(
    current: &StandardizedRecord,
    window: &[StandardizedRecord],
    days: usize,
) -> Option<f64> {
    let trailing = days.saturating_sub(1);
    if window.len() < trailing {
        return None;
    }

    let (total_up, total_down) = std::iter::once(current)
        .chain(window.iter().take(trailing))
        .fold((0.0, 0.0), |(up, down), r| {
            (up + r.stocks_up_4pct, down + r.stocks_down_4pct)
        });

    if total_down > 0.0 {
        Some(total_up / total_down)
    } else if total_up > 0.0 {
        Some(total_up)
    } else {
        Some(1.0)
    }
}
