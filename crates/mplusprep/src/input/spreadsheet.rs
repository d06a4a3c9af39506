//! Excel workbook loading via calamine.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use crate::error::{PrepError, Result};

use super::source::{DataTable, Value};

/// Load the first worksheet of a workbook. The first row holds the headers.
pub fn read_first_sheet(path: &Path) -> Result<DataTable> {
    tracing::debug!(path = %path.display(), "opening workbook");

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| PrepError::Spreadsheet(format!("Failed to open workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PrepError::EmptyData("Workbook has no worksheets".to_string()))?
        .map_err(|e| PrepError::Spreadsheet(format!("Failed to read first worksheet: {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| PrepError::EmptyData("First worksheet is empty".to_string()))?
        .iter()
        .map(header_text)
        .collect();

    let rows: Vec<Vec<Value>> = rows.map(|row| row.iter().map(cell_value).collect()).collect();

    Ok(DataTable::new(headers, rows))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::number(*i as f64),
        Data::Float(f) => Value::number(*f),
        Data::Bool(b) => Value::Number(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => Value::number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::from_cell(s),
        Data::Empty | Data::Error(_) => Value::Missing,
    }
}
