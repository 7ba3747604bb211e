//! CSV breadth data adapter.
//!
//! Reads one CSV file whose header names are raw record field names, either
//! generation (`stocks_up_4pct` or `stocks_up_4pct_daily`). Unknown columns
//! are ignored.

use crate::domain::breadth_record::RawBreadthRecord;
use crate::domain::error::BreadthError;
use crate::ports::data_port::BreadthDataPort;
use chrono::{Datelike, NaiveDate};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Date formats tried in order.
pub const DATE_FORMATS: [&str; 6] = [
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%y",
];

const MIN_YEAR: i32 = 1900;

const MISSING_MARKERS: [&str; 5] = ["", "md", "n/a", "na", "-"];

/// Columns kept as text rather than parsed as numbers.
const TEXT_COLUMNS: [&str; 4] = ["sp500", "sp_reference", "source_file", "import_format"];

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Every row in the file, sorted by date with undated rows last.
    pub fn load_all(&self) -> Result<Vec<RawBreadthRecord>, BreadthError> {
        let content = fs::read_to_string(&self.path).map_err(|e| BreadthError::DataSource {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| BreadthError::DataSource {
                reason: format!("CSV header error: {}", e),
            })?
            .iter()
            .map(normalize_header)
            .collect();

        let source_file = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());

        let mut records = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let row = result.map_err(|e| BreadthError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let mut fields = Map::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if let Some(value) = cell_value(header, cell) {
                    fields.insert(header.clone(), value);
                } else if header == "date" && !is_missing(cell) {
                    warn!(line = line + 2, value = cell, "unparsable date");
                }
            }

            let mut record: RawBreadthRecord = serde_json::from_value(Value::Object(fields))?;
            if record.source_file.is_none() {
                record.source_file = source_file.clone();
            }
            if record.import_format.is_none() {
                record.import_format = Some("csv".to_string());
            }
            records.push(record);
        }

        records.sort_by(|a, b| match (a.date, b.date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        debug!(path = %self.path.display(), rows = records.len(), "loaded breadth CSV");
        Ok(records)
    }
}

impl BreadthDataPort for CsvAdapter {
    fn fetch_records(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBreadthRecord>, BreadthError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.date.is_some_and(|d| d >= start_date && d <= end_date))
            .collect())
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BreadthError> {
        let dates: Vec<NaiveDate> = self.load_all()?.iter().filter_map(|r| r.date).collect();
        match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => Ok(Some((*first, *last, dates.len()))),
            _ => Ok(None),
        }
    }
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace([' ', '-'], "_")
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim().to_lowercase().as_str())
}

fn cell_value(header: &str, cell: &str) -> Option<Value> {
    if is_missing(cell) {
        return None;
    }
    if header == "date" {
        return parse_date(cell).map(|d| Value::String(d.format("%Y-%m-%d").to_string()));
    }
    if TEXT_COLUMNS.contains(&header) {
        return Some(Value::String(cell.trim().to_string()));
    }
    clean_numeric(cell).and_then(|v| serde_json::Number::from_f64(v).map(Value::Number))
}

/// Parse a date in any of [`DATE_FORMATS`]. Four-digit-year formats must
/// not swallow a two-digit year.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(text, fmt)
            .ok()
            .filter(|d| d.year() >= MIN_YEAR)
    })
}

/// Strip quotes, thousands separators and `$`; missing markers yield `None`.
pub fn clean_numeric(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| !matches!(c, '"' | ',' | '$'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
