//! Input and configuration validation results.
//!
//! Two tiers: errors block a calculation, warnings only lower confidence and
//! are echoed into the result metadata.

use crate::domain::breadth_record::RawBreadthRecord;
use crate::domain::standardize::{FieldRule, T2108, is_present, standardize};
use serde::Serialize;

/// Data quality (percent) below which a warning is raised.
pub const LOW_QUALITY_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub quality_score: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub missing_fields: Vec<String>,
    pub field_coverage: f64,
}

impl ValidationResult {
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Outcome of validating a scoring configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn new() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.valid = false;
    }

    pub fn warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Checks shared by every algorithm: the date is mandatory, missing fields
/// and a defaulted reference indicator are warnings.
pub fn validate_record(
    raw: &RawBreadthRecord,
    required: &[FieldRule],
    optional: &[FieldRule],
) -> ValidationResult {
    let standardized = standardize(raw);
    let mut result = ValidationResult {
        is_valid: true,
        quality_score: standardized.data_quality,
        errors: Vec::new(),
        warnings: Vec::new(),
        missing_fields: standardized.missing_fields.clone(),
        field_coverage: 0.0,
    };

    if raw.date.is_none() {
        result.push_error("date is required");
    }

    for rule in required {
        if !is_present(raw, rule) {
            result.push_warning(format!("missing required field {}", rule.name));
        }
    }

    let total = required.len() + optional.len();
    let present = required
        .iter()
        .chain(optional.iter())
        .filter(|rule| is_present(raw, rule))
        .count();
    result.field_coverage = if total == 0 {
        100.0
    } else {
        present as f64 / total as f64 * 100.0
    };

    if !is_present(raw, &T2108) {
        result.push_warning("t2108 missing, using neutral value 50");
    }
    if standardized.data_quality < LOW_QUALITY_THRESHOLD {
        result.push_warning(format!(
            "low data quality: {:.1}%",
            standardized.data_quality
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::standardize::{ADVANCING_ISSUES, DECLINING_ISSUES, NEW_HIGHS};
    use chrono::NaiveDate;

    fn dated() -> RawBreadthRecord {
        RawBreadthRecord::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    #[test]
    fn missing_date_is_an_error() {
        let result = validate_record(&RawBreadthRecord::default(), &[], &[]);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["date is required".to_string()]);
    }

    #[test]
    fn missing_fields_are_warnings() {
        let mut raw = dated();
        raw.advancing_issues = Some(100.0);
        let result = validate_record(&raw, &[ADVANCING_ISSUES, DECLINING_ISSUES], &[NEW_HIGHS]);
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w == "missing required field declining_issues"));
        assert!(result.warnings.iter().any(|w| w.starts_with("t2108 missing")));
        assert!((result.field_coverage - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn low_quality_warning() {
        let result = validate_record(&dated(), &[], &[]);
        assert!(result.warnings.iter().any(|w| w.starts_with("low data quality")));
        assert_eq!(result.field_coverage, 100.0);
    }

    #[test]
    fn config_validation_errors_clear_valid() {
        let mut result = ConfigValidation::new();
        result.warning("w");
        assert!(result.valid);
        result.error("e");
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["e".to_string()]);
        assert_eq!(result.warnings, vec!["w".to_string()]);
    }
}
