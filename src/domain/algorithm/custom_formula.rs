//! Custom-formula algorithm.
//!
//! Builds the six-factor breakdown, exposes it to the user's formula as a
//! flat variable context and uses the formula's value as the raw score.
//! Formula failures fall back to `0.4·primary + 0.35·secondary +
//! 0.25·reference` with a warning.

use super::six_factor::{FactorBreakdown, factor_breakdown};
use super::{BreadthAlgorithm, Outcome, finish, prepare};
use crate::domain::breadth_record::RawBreadthRecord;
use crate::domain::configuration::{AlgorithmKind, Configuration};
use crate::domain::error::BreadthError;
use crate::domain::formula_eval::{FormulaContext, execute};
use crate::domain::result::BreadthResult;
use crate::domain::scoring::{self, CategoryScores};
use crate::domain::standardize::{
    ADVANCING_ISSUES, DECLINING_ISSUES, DOWN_VOLUME, FieldRule, NEW_HIGHS, NEW_LOWS,
    STOCKS_DOWN_4PCT, STOCKS_UP_4PCT, StandardizedRecord, T2108, UP_VOLUME,
};

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
pub struct CustomFormula;

pub fn fallback_score(categories: &CategoryScores) -> f64 {
    0.4 * categories.primary + 0.35 * categories.secondary + 0.25 * categories.reference
}

/// Variables visible to a custom formula. User parameters are applied last
/// but never replace a built-in name.
pub fn build_context(
    current: &StandardizedRecord,
    breakdown: &FactorBreakdown,
    categories: &CategoryScores,
    config: &Configuration,
) -> FormulaContext {
    let mut ctx = FormulaContext::new();
    for (name, value) in &config.custom_parameters {
        ctx.set(name.clone(), *value);
    }
    ctx.set("primary", categories.primary);
    ctx.set("secondary", categories.secondary);
    ctx.set("reference", categories.reference);
    ctx.set("sector", categories.sector);
    ctx.set("ad_ratio", breakdown.ad_ratio);
    ctx.set("hl_ratio", breakdown.hl_ratio);
    ctx.set("volume_ratio", breakdown.volume_ratio);
    ctx.set("mover_ratio", breakdown.mover_ratio);
    ctx.set("t2108", current.t2108);
    ctx.set("momentum", breakdown.momentum_points * 10.0);
    ctx.set("momentum_ratio", breakdown.momentum_ratio.unwrap_or(1.0));
    ctx.set("sector_avg", categories.sector);
    ctx.set("data_quality", current.data_quality);
    ctx
}

impl BreadthAlgorithm for CustomFormula {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Custom
    }

    fn name(&self) -> &'static str {
        "Custom Formula"
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
        let mut warnings = Vec::new();

        let breakdown = factor_breakdown(
            &prepared.current,
            &prepared.window,
            config.indicators.momentum_lookback_days,
            &mut warnings,
        );
        let categories = breakdown.categories();
        let (_, components) = scoring::combine(&categories, &config.weights);

        let formula_score = match &config.custom_formula {
            Some(formula) => {
                let ctx = build_context(&prepared.current, &breakdown, &categories, config);
                match execute(formula, &ctx) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warnings.push(format!("custom formula failed ({}), using fallback blend", e));
                        None
                    }
                }
            }
            None => {
                warnings.push("no custom formula configured, using fallback blend".to_string());
                None
            }
        };
        let raw_score =
            scoring::clamp_score(formula_score.unwrap_or_else(|| fallback_score(&categories)));
        let normalized = scoring::scale(raw_score, &config.scaling);

        let outcome = Outcome::standard(
            raw_score,
            normalized,
            components,
            breakdown.momentum_ratio,
            config,
        );
        prepared.warnings.extend(warnings);
        Ok(finish(self.kind(), prepared, config, outcome))
    }
}
