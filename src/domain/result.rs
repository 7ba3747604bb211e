//! Calculation results.

use crate::domain::configuration::AlgorithmKind;
use crate::domain::market_condition::MarketCondition;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Weighted contribution of each category to the raw score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub primary: f64,
    pub secondary: f64,
    pub reference: f64,
    pub sector: f64,
}

impl Components {
    pub fn total(&self) -> f64 {
        self.primary + self.secondary + self.reference + self.sector
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub algorithm: AlgorithmKind,
    pub config_version: String,
    pub calculation_time_ms: f64,
    pub data_quality: f64,
    pub missing_fields: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadthResult {
    pub date: NaiveDate,
    pub score: f64,
    pub normalized_score: f64,
    pub confidence: f64,
    pub components: Components,
    pub market_condition: MarketCondition,
    pub metadata: ResultMetadata,
}

impl BreadthResult {
    /// Equality ignoring `calculation_time_ms`.
    pub fn same_outcome(&self, other: &BreadthResult) -> bool {
        let mut a = self.metadata.clone();
        let mut b = other.metadata.clone();
        a.calculation_time_ms = 0.0;
        b.calculation_time_ms = 0.0;
        self.date == other.date
            && self.score == other.score
            && self.normalized_score == other.normalized_score
            && self.confidence == other.confidence
            && self.components == other.components
            && self.market_condition == other.market_condition
            && a == b
    }
}
