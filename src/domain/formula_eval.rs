//! Formula evaluation.
//!
//! Evaluates a parsed [`Expr`] against a flat variable context. Any failure
//! (unknown variable, division producing infinity or NaN) is an error; the
//! custom-formula algorithm turns errors into its fallback score.

use crate::domain::error::FormulaError;
use crate::domain::formula::Expr;
use crate::domain::formula_parser::validate_syntax;
use std::collections::BTreeMap;

/// Variables the custom-formula algorithm always provides.
pub const BUILTIN_VARIABLES: [&str; 13] = [
    "primary",
    "secondary",
    "reference",
    "sector",
    "ad_ratio",
    "hl_ratio",
    "volume_ratio",
    "mover_ratio",
    "t2108",
    "momentum",
    "momentum_ratio",
    "sector_avg",
    "data_quality",
];

/// Value given to every variable when a formula is dry-run at
/// configuration-validation time.
pub const DUMMY_VALUE: f64 = 50.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaContext {
    vars: BTreeMap<String, f64>,
}

impl FormulaContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.vars.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }
}

pub fn evaluate(expr: &Expr, ctx: &FormulaContext) -> Result<f64, FormulaError> {
    let value = match expr {
        Expr::Number(v) => *v,
        Expr::Variable(name) => ctx
            .get(name)
            .ok_or_else(|| FormulaError::UnknownVariable { name: name.clone() })?,
        Expr::Neg(inner) => -evaluate(inner, ctx)?,
        Expr::Binary { op, left, right } => {
            op.apply(evaluate(left, ctx)?, evaluate(right, ctx)?)
        }
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormulaError::NonFinite)
    }
}

/// Validate, parse and evaluate `formula` in one step.
pub fn execute(formula: &str, ctx: &FormulaContext) -> Result<f64, FormulaError> {
    let expr = validate_syntax(formula)?;
    evaluate(&expr, ctx)
}

/// Context with every built-in variable and every user parameter set to
/// [`DUMMY_VALUE`].
pub fn dummy_context<'a, I>(parameters: I) -> FormulaContext
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ctx = FormulaContext::new();
    for name in BUILTIN_VARIABLES {
        ctx.set(name, DUMMY_VALUE);
    }
    for name in parameters {
        ctx.set(name, DUMMY_VALUE);
    }
    ctx
}

pub fn validate_with_dummy_context<'a, I>(formula: &str, parameters: I) -> Result<f64, FormulaError>
where
    I: IntoIterator<Item = &'a str>,
{
    execute(formula, &dummy_context(parameters))
}
