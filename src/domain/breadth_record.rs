//! Raw daily breadth record as supplied by importers and callers.
//!
//! Field names follow two generations of the breadth data files: the newer
//! `stocks_up_4pct` / `stocks_up_25pct_quarter` naming and the older
//! `stocks_up_4pct_daily` / `stocks_up_25pct_quarterly` columns. Both are kept
//! side by side so the standardizer can pick the preferred one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBreadthRecord {
    pub date: Option<NaiveDate>,

    pub advancing_issues: Option<f64>,
    pub declining_issues: Option<f64>,
    pub new_highs: Option<f64>,
    pub new_lows: Option<f64>,
    pub up_volume: Option<f64>,
    pub down_volume: Option<f64>,

    pub stocks_up_4pct: Option<f64>,
    pub stocks_down_4pct: Option<f64>,
    pub stocks_up_25pct_quarter: Option<f64>,
    pub stocks_down_25pct_quarter: Option<f64>,
    pub stocks_up_25pct_month: Option<f64>,
    pub stocks_down_25pct_month: Option<f64>,
    pub stocks_up_50pct_month: Option<f64>,
    pub stocks_down_50pct_month: Option<f64>,
    pub stocks_up_13pct_34days: Option<f64>,
    pub stocks_down_13pct_34days: Option<f64>,
    pub ratio_5day: Option<f64>,
    pub ratio_10day: Option<f64>,
    pub worden_universe: Option<f64>,

    pub stocks_up_4pct_daily: Option<f64>,
    pub stocks_down_4pct_daily: Option<f64>,
    pub stocks_up_25pct_quarterly: Option<f64>,
    pub stocks_down_25pct_quarterly: Option<f64>,
    pub stocks_up_25pct_monthly: Option<f64>,
    pub stocks_down_25pct_monthly: Option<f64>,
    pub stocks_up_50pct_monthly: Option<f64>,
    pub stocks_down_50pct_monthly: Option<f64>,
    pub worden_common_stocks: Option<f64>,

    pub t2108: Option<f64>,
    pub sp500: Option<String>,
    pub sp_reference: Option<String>,

    pub basic_materials_sector: Option<f64>,
    pub consumer_cyclical_sector: Option<f64>,
    pub financial_services_sector: Option<f64>,
    pub real_estate_sector: Option<f64>,
    pub consumer_defensive_sector: Option<f64>,
    pub healthcare_sector: Option<f64>,
    pub utilities_sector: Option<f64>,
    pub communication_services_sector: Option<f64>,
    pub energy_sector: Option<f64>,
    pub industrials_sector: Option<f64>,
    pub technology_sector: Option<f64>,

    pub source_file: Option<String>,
    pub import_format: Option<String>,
    pub data_quality_score: Option<f64>,
}

/// Every numeric (or numerically parseable) input column of a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawField {
    AdvancingIssues,
    DecliningIssues,
    NewHighs,
    NewLows,
    UpVolume,
    DownVolume,
    StocksUp4Pct,
    StocksDown4Pct,
    StocksUp25PctQuarter,
    StocksDown25PctQuarter,
    StocksUp25PctMonth,
    StocksDown25PctMonth,
    StocksUp50PctMonth,
    StocksDown50PctMonth,
    StocksUp13Pct34Days,
    StocksDown13Pct34Days,
    Ratio5Day,
    Ratio10Day,
    WordenUniverse,
    StocksUp4PctDaily,
    StocksDown4PctDaily,
    StocksUp25PctQuarterly,
    StocksDown25PctQuarterly,
    StocksUp25PctMonthly,
    StocksDown25PctMonthly,
    StocksUp50PctMonthly,
    StocksDown50PctMonthly,
    WordenCommonStocks,
    T2108,
    Sp500,
    SpReference,
}

/// The eleven market sectors carried on a breadth record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    BasicMaterials,
    ConsumerCyclical,
    FinancialServices,
    RealEstate,
    ConsumerDefensive,
    Healthcare,
    Utilities,
    CommunicationServices,
    Energy,
    Industrials,
    Technology,
}

impl Sector {
    pub const ALL: [Sector; 11] = [
        Sector::BasicMaterials,
        Sector::ConsumerCyclical,
        Sector::FinancialServices,
        Sector::RealEstate,
        Sector::ConsumerDefensive,
        Sector::Healthcare,
        Sector::Utilities,
        Sector::CommunicationServices,
        Sector::Energy,
        Sector::Industrials,
        Sector::Technology,
    ];

}

impl RawBreadthRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    /// Numeric value of a raw column. Index levels are parsed from text; an
    /// unparsable level counts as present with value 0.
    pub fn value(&self, field: RawField) -> Option<f64> {
        match field {
            RawField::AdvancingIssues => self.advancing_issues,
            RawField::DecliningIssues => self.declining_issues,
            RawField::NewHighs => self.new_highs,
            RawField::NewLows => self.new_lows,
            RawField::UpVolume => self.up_volume,
            RawField::DownVolume => self.down_volume,
            RawField::StocksUp4Pct => self.stocks_up_4pct,
            RawField::StocksDown4Pct => self.stocks_down_4pct,
            RawField::StocksUp25PctQuarter => self.stocks_up_25pct_quarter,
            RawField::StocksDown25PctQuarter => self.stocks_down_25pct_quarter,
            RawField::StocksUp25PctMonth => self.stocks_up_25pct_month,
            RawField::StocksDown25PctMonth => self.stocks_down_25pct_month,
            RawField::StocksUp50PctMonth => self.stocks_up_50pct_month,
            RawField::StocksDown50PctMonth => self.stocks_down_50pct_month,
            RawField::StocksUp13Pct34Days => self.stocks_up_13pct_34days,
            RawField::StocksDown13Pct34Days => self.stocks_down_13pct_34days,
            RawField::Ratio5Day => self.ratio_5day,
            RawField::Ratio10Day => self.ratio_10day,
            RawField::WordenUniverse => self.worden_universe,
            RawField::StocksUp4PctDaily => self.stocks_up_4pct_daily,
            RawField::StocksDown4PctDaily => self.stocks_down_4pct_daily,
            RawField::StocksUp25PctQuarterly => self.stocks_up_25pct_quarterly,
            RawField::StocksDown25PctQuarterly => self.stocks_down_25pct_quarterly,
            RawField::StocksUp25PctMonthly => self.stocks_up_25pct_monthly,
            RawField::StocksDown25PctMonthly => self.stocks_down_25pct_monthly,
            RawField::StocksUp50PctMonthly => self.stocks_up_50pct_monthly,
            RawField::StocksDown50PctMonthly => self.stocks_down_50pct_monthly,
            RawField::WordenCommonStocks => self.worden_common_stocks,
            RawField::T2108 => self.t2108,
            RawField::Sp500 => self.sp500.as_deref().map(parse_index_level),
            RawField::SpReference => self.sp_reference.as_deref().map(parse_index_level),
        }
        .filter(|v| !v.is_nan())
    }

    pub fn sector(&self, sector: Sector) -> Option<f64> {
        match sector {
            Sector::BasicMaterials => self.basic_materials_sector,
            Sector::ConsumerCyclical => self.consumer_cyclical_sector,
            Sector::FinancialServices => self.financial_services_sector,
            Sector::RealEstate => self.real_estate_sector,
            Sector::ConsumerDefensive => self.consumer_defensive_sector,
            Sector::Healthcare => self.healthcare_sector,
            Sector::Utilities => self.utilities_sector,
            Sector::CommunicationServices => self.communication_services_sector,
            Sector::Energy => self.energy_sector,
            Sector::Industrials => self.industrials_sector,
            Sector::Technology => self.technology_sector,
        }
        .filter(|v| v.is_finite())
    }

    pub fn set_sector(&mut self, sector: Sector, value: Option<f64>) {
        let slot = match sector {
            Sector::BasicMaterials => &mut self.basic_materials_sector,
            Sector::ConsumerCyclical => &mut self.consumer_cyclical_sector,
            Sector::FinancialServices => &mut self.financial_services_sector,
            Sector::RealEstate => &mut self.real_estate_sector,
            Sector::ConsumerDefensive => &mut self.consumer_defensive_sector,
            Sector::Healthcare => &mut self.healthcare_sector,
            Sector::Utilities => &mut self.utilities_sector,
            Sector::CommunicationServices => &mut self.communication_services_sector,
            Sector::Energy => &mut self.energy_sector,
            Sector::Industrials => &mut self.industrials_sector,
            Sector::Technology => &mut self.technology_sector,
        };
        *slot = value;
    }

    /// Number of sector columns carrying a finite value.
    pub fn sector_count(&self) -> usize {
        Sector::ALL
            .iter()
            .filter(|s| self.sector(**s).is_some())
            .count()
    }
}

/// Parse a textual index level such as `"5,234.18"`; unparsable text yields 0.
pub fn parse_index_level(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | ',' | '$') && !c.is_whitespace())
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
