use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Days, NaiveDate};

use crate::errors::DecodeError;

pub const COL_EMPLOYEE_CODE: &str = "Sicil No";
pub const COL_FULL_NAME: &str = "Personel";
pub const COL_WORK_DATE: &str = "Tarih";
pub const COL_ENTRY_TYPE: &str = "Puantaj Kaydı Türü";

/// Headers the export must carry for a meaningful import. Only `Sicil No`
/// has no fallback: a file missing it is rejected outright, while a missing
/// secondary column merely degrades the import.
pub const REQUIRED_COLUMNS: [&str; 4] = [
    COL_EMPLOYEE_CODE,
    COL_FULL_NAME,
    COL_WORK_DATE,
    COL_ENTRY_TYPE,
];

static EMPTY_CELL: Data = Data::Empty;

/// First worksheet of a workbook as an owned grid: header row split off,
/// every remaining row kept as raw cells.
#[derive(Debug, Clone)]
pub struct SheetGrid {
    headers: Vec<String>,
    rows: Vec<Vec<Data>>,
}

impl SheetGrid {
    /// Decode workbook bytes (xlsx or xls). Fails with [`DecodeError::EmptyInput`]
    /// when the sheet has fewer than two rows; header resolution is left to the
    /// caller so partially usable files can still be decoded.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let sheet_names = workbook.sheet_names().to_owned();
        let first_sheet = sheet_names.first().ok_or(DecodeError::EmptyInput)?;
        let range = workbook.worksheet_range(first_sheet)?;

        if range.height() < 2 {
            return Err(DecodeError::EmptyInput);
        }

        let mut rows_iter = range.rows();
        let headers = rows_iter
            .next()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default();
        let rows = rows_iter.map(<[Data]>::to_vec).collect();

        Ok(Self { headers, rows })
    }

    /// Column index by exact trimmed header text.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Which of [`REQUIRED_COLUMNS`] are absent, in declaration order.
    pub fn missing_required_columns(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|name| self.column(name).is_none())
            .map(|name| (*name).to_string())
            .collect()
    }

    /// Fail with [`DecodeError::MissingColumns`] unless every required header
    /// resolved.
    pub fn require_columns(&self) -> Result<(), DecodeError> {
        let missing = self.missing_required_columns();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::MissingColumns { missing })
        }
    }

    pub fn rows(&self) -> &[Vec<Data>] {
        &self.rows
    }

    /// Cell at a resolved column, with unresolved columns and short rows both
    /// reading as an empty cell.
    pub fn cell<'a>(&self, row: &'a [Data], column: Option<usize>) -> &'a Data {
        column
            .and_then(|index| row.get(index))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// Text rendering of a cell, trimmed; empty and error cells render as "".
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(text) => text.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// Lenient numeric reading: native numbers pass through, numeric strings
/// parse, everything else is `None`.
pub fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(value) => Some(*value),
        Data::Int(value) => Some(*value as f64),
        Data::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Calendar date from a cell that may hold a native date, an ISO-like string,
/// or a raw spreadsheet serial. Anything unparseable is `None` and the row is
/// skipped upstream.
pub fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(value) => serial_to_date(value.as_f64()),
        Data::DateTimeIso(text) | Data::String(text) => iso_prefix_date(text),
        Data::Float(value) => serial_to_date(*value),
        Data::Int(value) => serial_to_date(*value as f64),
        _ => None,
    }
}

/// Spreadsheet serials count days from the 1899-12-30 epoch; time-of-day
/// fractions are discarded.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial <= 0.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.trunc() as u64))
}

fn iso_prefix_date(text: &str) -> Option<NaiveDate> {
    let head = text.trim().split('T').next().unwrap_or("");
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
