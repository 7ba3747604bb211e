#![allow(dead_code)]

use breadthscore::adapters::memory_config_store::MemoryConfigStore;
use breadthscore::domain::breadth_record::{RawBreadthRecord, Sector};
use breadthscore::domain::config_manager::ConfigManager;
use breadthscore::domain::configuration::default_configurations;
use breadthscore::domain::engine::BreadthEngine;
use breadthscore::domain::error::BreadthError;
use breadthscore::ports::data_port::BreadthDataPort;
use chrono::{Duration, NaiveDate};

pub struct MockDataPort {
    pub records: Vec<RawBreadthRecord>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            error: None,
        }
    }

    pub fn with_records(mut self, records: Vec<RawBreadthRecord>) -> Self {
        self.records.extend(records);
        self.records.sort_by_key(|r| r.date);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    fn check(&self) -> Result<(), BreadthError> {
        match &self.error {
            Some(reason) => Err(BreadthError::DataSource {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl BreadthDataPort for MockDataPort {
    fn fetch_records(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBreadthRecord>, BreadthError> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .filter(|r| r.date.is_some_and(|d| d >= start_date && d <= end_date))
            .cloned()
            .collect())
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BreadthError> {
        self.check()?;
        let dates: Vec<NaiveDate> = self.records.iter().filter_map(|r| r.date).collect();
        Ok(match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => Some((*first, *last, dates.len())),
            _ => None,
        })
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Record with every legacy breadth field populated.
pub fn make_record(day: &str, advancing: f64, declining: f64) -> RawBreadthRecord {
    let mut raw = RawBreadthRecord::new(date(day));
    raw.advancing_issues = Some(advancing);
    raw.declining_issues = Some(declining);
    raw.new_highs = Some(150.0);
    raw.new_lows = Some(50.0);
    raw.up_volume = Some(3.0e9);
    raw.down_volume = Some(2.0e9);
    raw.stocks_up_4pct = Some(400.0);
    raw.stocks_down_4pct = Some(200.0);
    raw.t2108 = Some(60.0);
    raw.sp500 = Some("\"5,123.45\"".to_string());
    raw
}

pub fn with_sectors(mut raw: RawBreadthRecord, values: &[f64]) -> RawBreadthRecord {
    for (sector, value) in Sector::ALL.iter().zip(values) {
        raw.set_sector(*sector, Some(*value));
    }
    raw
}

/// `days` consecutive daily records ending the day before `end`, oldest first.
pub fn make_history(end: &str, days: i64) -> Vec<RawBreadthRecord> {
    let end = date(end);
    (1..=days)
        .rev()
        .map(|offset| {
            let d = end - Duration::days(offset);
            let advancing = 1500.0 + (offset % 7) as f64 * 120.0;
            let mut raw = make_record(&d.format("%Y-%m-%d").to_string(), advancing, 1400.0);
            raw.stocks_up_4pct = Some(300.0 + (offset % 5) as f64 * 20.0);
            raw
        })
        .collect()
}

pub fn seeded_engine() -> BreadthEngine {
    let manager = ConfigManager::new(Box::new(MemoryConfigStore::new()));
    manager.initialize(default_configurations()).unwrap();
    BreadthEngine::new(manager)
}
