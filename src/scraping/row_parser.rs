use chrono::NaiveDate;

use crate::scraping::models::{Record, TargetPeriod};

/// A data row needs at least this many cells to be considered.
pub const MIN_CELLS: usize = 7;
/// Cell holding the document date (`DD/MM/YYYY`, sometimes followed by a
/// time component we ignore).
pub const DATE_CELL: usize = 3;
/// Cell holding the document identifier used to fetch the PDF.
pub const ITU_CELL: usize = 6;

/// Classification of one parsed table row against the target period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowClass {
    /// Dated inside the target month/year; carries the record to download.
    InScope(Record),
    /// Valid date outside the target period; still feeds the oldest-date
    /// tracker that drives the stop condition.
    OutOfScope(NaiveDate),
    /// Too few cells or an unparsable date cell. Skipped entirely.
    Unparsable,
}

/// Parses the first whitespace-delimited token of a date cell as
/// `DD/MM/YYYY`. The portal appends a time component on some rows.
pub fn parse_row_date(cell: &str) -> Option<NaiveDate> {
    let token = cell.split_whitespace().next()?;
    NaiveDate::parse_from_str(token, "%d/%m/%Y").ok()
}

pub fn classify_row(cells: &[String], target: &TargetPeriod) -> RowClass {
    if cells.len() < MIN_CELLS {
        return RowClass::Unparsable;
    }
    let date = match parse_row_date(&cells[DATE_CELL]) {
        Some(date) => date,
        None => return RowClass::Unparsable,
    };
    if target.contains(date) {
        RowClass::InScope(Record {
            date,
            itu: cells[ITU_CELL].clone(),
        })
    } else {
        RowClass::OutOfScope(date)
    }
}
