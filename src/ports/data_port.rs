//! Breadth data access port trait.

use crate::domain::breadth_record::RawBreadthRecord;
use crate::domain::error::BreadthError;
use chrono::NaiveDate;

pub trait BreadthDataPort {
    /// Records dated within `[start_date, end_date]`, ascending by date.
    fn fetch_records(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBreadthRecord>, BreadthError>;

    /// First date, last date and record count, or `None` when empty.
    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BreadthError>;
}
