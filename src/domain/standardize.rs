//! Data standardization.
//!
//! Resolves a [`RawBreadthRecord`] into a [`StandardizedRecord`] where every
//! numeric field has a concrete value. Each canonical field is described by a
//! [`FieldRule`]: an ordered list of raw columns to try, then a neutral default.

use crate::domain::breadth_record::{RawBreadthRecord, RawField, Sector};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Neutral value for the reference indicator when it is absent.
pub const NEUTRAL_T2108: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub sources: &'static [RawField],
    pub default: f64,
}

macro_rules! rule {
    ($ident:ident, $name:literal, [$($src:ident),+], $default:expr) => {
        pub const $ident: FieldRule = FieldRule {
            name: $name,
            sources: &[$(RawField::$src),+],
            default: $default,
        };
    };
}

rule!(ADVANCING_ISSUES, "advancing_issues", [AdvancingIssues, StocksUp4Pct, StocksUp4PctDaily], 0.0);
rule!(DECLINING_ISSUES, "declining_issues", [DecliningIssues, StocksDown4Pct, StocksDown4PctDaily], 0.0);
rule!(NEW_HIGHS, "new_highs", [NewHighs, StocksUp25PctQuarter, StocksUp25PctQuarterly], 0.0);
rule!(NEW_LOWS, "new_lows", [NewLows, StocksDown25PctQuarter, StocksDown25PctQuarterly], 0.0);
rule!(UP_VOLUME, "up_volume", [UpVolume], 0.0);
rule!(DOWN_VOLUME, "down_volume", [DownVolume], 0.0);
rule!(STOCKS_UP_4PCT, "stocks_up_4pct", [StocksUp4Pct, StocksUp4PctDaily], 0.0);
rule!(STOCKS_DOWN_4PCT, "stocks_down_4pct", [StocksDown4Pct, StocksDown4PctDaily], 0.0);
rule!(STOCKS_UP_25PCT_QUARTER, "stocks_up_25pct_quarter", [StocksUp25PctQuarter, StocksUp25PctQuarterly], 0.0);
rule!(STOCKS_DOWN_25PCT_QUARTER, "stocks_down_25pct_quarter", [StocksDown25PctQuarter, StocksDown25PctQuarterly], 0.0);
rule!(STOCKS_UP_25PCT_MONTH, "stocks_up_25pct_month", [StocksUp25PctMonth, StocksUp25PctMonthly], 0.0);
rule!(STOCKS_DOWN_25PCT_MONTH, "stocks_down_25pct_month", [StocksDown25PctMonth, StocksDown25PctMonthly], 0.0);
rule!(STOCKS_UP_50PCT_MONTH, "stocks_up_50pct_month", [StocksUp50PctMonth, StocksUp50PctMonthly], 0.0);
rule!(STOCKS_DOWN_50PCT_MONTH, "stocks_down_50pct_month", [StocksDown50PctMonth, StocksDown50PctMonthly], 0.0);
rule!(STOCKS_UP_13PCT_34DAYS, "stocks_up_13pct_34days", [StocksUp13Pct34Days], 0.0);
rule!(STOCKS_DOWN_13PCT_34DAYS, "stocks_down_13pct_34days", [StocksDown13Pct34Days], 0.0);
rule!(RATIO_5DAY, "ratio_5day", [Ratio5Day], 0.0);
rule!(RATIO_10DAY, "ratio_10day", [Ratio10Day], 0.0);
rule!(T2108, "t2108", [T2108], NEUTRAL_T2108);
rule!(SP500, "sp500", [Sp500, SpReference], 0.0);
rule!(WORDEN_UNIVERSE, "worden_universe", [WordenUniverse, WordenCommonStocks], 0.0);

pub const FIELD_RULES: [FieldRule; 21] = [
    ADVANCING_ISSUES,
    DECLINING_ISSUES,
    NEW_HIGHS,
    NEW_LOWS,
    UP_VOLUME,
    DOWN_VOLUME,
    STOCKS_UP_4PCT,
    STOCKS_DOWN_4PCT,
    STOCKS_UP_25PCT_QUARTER,
    STOCKS_DOWN_25PCT_QUARTER,
    STOCKS_UP_25PCT_MONTH,
    STOCKS_DOWN_25PCT_MONTH,
    STOCKS_UP_50PCT_MONTH,
    STOCKS_DOWN_50PCT_MONTH,
    STOCKS_UP_13PCT_34DAYS,
    STOCKS_DOWN_13PCT_34DAYS,
    RATIO_5DAY,
    RATIO_10DAY,
    T2108,
    SP500,
    WORDEN_UNIVERSE,
];

/// Fields counted by `data_quality`, besides the date.
pub const QUALITY_FIELDS: [FieldRule; 12] = [
    ADVANCING_ISSUES,
    DECLINING_ISSUES,
    NEW_HIGHS,
    NEW_LOWS,
    UP_VOLUME,
    DOWN_VOLUME,
    STOCKS_UP_4PCT,
    STOCKS_DOWN_4PCT,
    STOCKS_UP_25PCT_QUARTER,
    STOCKS_DOWN_25PCT_QUARTER,
    T2108,
    SP500,
];

/// Outcome of resolving one canonical field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub value: f64,
    pub source: Option<RawField>,
}

pub fn resolve(raw: &RawBreadthRecord, rule: &FieldRule) -> Resolved {
    for &field in rule.sources {
        if let Some(value) = raw.value(field) {
            return Resolved {
                value,
                source: Some(field),
            };
        }
    }
    Resolved {
        value: rule.default,
        source: None,
    }
}

pub fn is_present(raw: &RawBreadthRecord, rule: &FieldRule) -> bool {
    resolve(raw, rule).source.is_some()
}

/// Sector strengths that were present on the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorValues {
    values: BTreeMap<Sector, f64>,
}

impl SectorValues {
    pub fn from_raw(raw: &RawBreadthRecord) -> Option<Self> {
        let values: BTreeMap<Sector, f64> = Sector::ALL
            .iter()
            .filter_map(|s| raw.sector(*s).map(|v| (*s, v)))
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(Self { values })
        }
    }

    pub fn get(&self, sector: Sector) -> Option<f64> {
        self.values.get(&sector).copied()
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.values().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Sector, f64)> + '_ {
        self.values.iter().map(|(s, v)| (*s, *v))
    }

    pub fn average(&self) -> f64 {
        self.values.values().sum::<f64>() / self.values.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizedRecord {
    pub date: Option<NaiveDate>,
    pub advancing_issues: f64,
    pub declining_issues: f64,
    pub new_highs: f64,
    pub new_lows: f64,
    pub up_volume: f64,
    pub down_volume: f64,
    pub stocks_up_4pct: f64,
    pub stocks_down_4pct: f64,
    pub stocks_up_25pct_quarter: f64,
    pub stocks_down_25pct_quarter: f64,
    pub stocks_up_25pct_month: f64,
    pub stocks_down_25pct_month: f64,
    pub stocks_up_50pct_month: f64,
    pub stocks_down_50pct_month: f64,
    pub stocks_up_13pct_34days: f64,
    pub stocks_down_13pct_34days: f64,
    pub ratio_5day: f64,
    pub ratio_10day: f64,
    pub t2108: f64,
    pub sp500: f64,
    pub worden_universe: f64,
    pub sectors: Option<SectorValues>,
    pub missing_fields: Vec<String>,
    pub data_quality: f64,
}

impl StandardizedRecord {
    /// advancing / (advancing + declining), or `None` without any issues.
    pub fn advance_decline_ratio(&self) -> Option<f64> {
        share(self.advancing_issues, self.declining_issues)
    }

    pub fn high_low_ratio(&self) -> Option<f64> {
        share(self.new_highs, self.new_lows)
    }

    pub fn volume_ratio(&self) -> Option<f64> {
        share(self.up_volume, self.down_volume)
    }

    pub fn mover_ratio(&self) -> Option<f64> {
        share(self.stocks_up_4pct, self.stocks_down_4pct)
    }

    pub fn is_missing(&self, field: &str) -> bool {
        self.missing_fields.iter().any(|f| f == field)
    }
}

fn share(up: f64, down: f64) -> Option<f64> {
    let total = up + down;
    if total > 0.0 { Some(up / total) } else { None }
}

pub fn standardize(raw: &RawBreadthRecord) -> StandardizedRecord {
    let value = |rule: &FieldRule| resolve(raw, rule).value;

    let mut missing_fields = Vec::new();
    let mut present = 0usize;
    if raw.date.is_some() {
        present += 1;
    } else {
        missing_fields.push("date".to_string());
    }
    for rule in &QUALITY_FIELDS {
        if is_present(raw, rule) {
            present += 1;
        } else {
            missing_fields.push(rule.name.to_string());
        }
    }
    let data_quality = present as f64 / (QUALITY_FIELDS.len() + 1) as f64 * 100.0;

    StandardizedRecord {
        date: raw.date,
        advancing_issues: value(&ADVANCING_ISSUES),
        declining_issues: value(&DECLINING_ISSUES),
        new_highs: value(&NEW_HIGHS),
        new_lows: value(&NEW_LOWS),
        up_volume: value(&UP_VOLUME),
        down_volume: value(&DOWN_VOLUME),
        stocks_up_4pct: value(&STOCKS_UP_4PCT),
        stocks_down_4pct: value(&STOCKS_DOWN_4PCT),
        stocks_up_25pct_quarter: value(&STOCKS_UP_25PCT_QUARTER),
        stocks_down_25pct_quarter: value(&STOCKS_DOWN_25PCT_QUARTER),
        stocks_up_25pct_month: value(&STOCKS_UP_25PCT_MONTH),
        stocks_down_25pct_month: value(&STOCKS_DOWN_25PCT_MONTH),
        stocks_up_50pct_month: value(&STOCKS_UP_50PCT_MONTH),
        stocks_down_50pct_month: value(&STOCKS_DOWN_50PCT_MONTH),
        stocks_up_13pct_34days: value(&STOCKS_UP_13PCT_34DAYS),
        stocks_down_13pct_34days: value(&STOCKS_DOWN_13PCT_34DAYS),
        ratio_5day: value(&RATIO_5DAY),
        ratio_10day: value(&RATIO_10DAY),
        t2108: value(&T2108),
        sp500: value(&SP500),
        worden_universe: value(&WORDEN_UNIVERSE),
        sectors: SectorValues::from_raw(raw),
        missing_fields,
        data_quality,
    }
}

/// Standardize a history slice into the trailing window for `current`:
/// dated strictly before it, newest first. Undated entries are dropped.
pub fn trailing_window(
    current: Option<NaiveDate>,
    history: &[RawBreadthRecord],
) -> Vec<StandardizedRecord> {
    let mut window: Vec<StandardizedRecord> = history
        .iter()
        .filter(|r| match (r.date, current) {
            (Some(d), Some(c)) => d < c,
            (Some(_), None) => true,
            (None, _) => false,
        })
        .map(standardize)
        .collect();
    window.sort_by(|a, b| b.date.cmp(&a.date));
    window
}
