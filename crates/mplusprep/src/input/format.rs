//! Source format detection by file extension.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Kind of tabular source, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Comma-delimited text (`.csv`).
    DelimitedText,
    /// Excel workbook (`.xlsx`, `.xls`).
    Spreadsheet,
    /// SPSS system file (`.sav`).
    StatisticalBinary,
}

impl SourceFormat {
    /// Determine the format of `path` from its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(Self::DelimitedText),
            "xlsx" | "xls" => Ok(Self::Spreadsheet),
            "sav" => Ok(Self::StatisticalBinary),
            "" => Err(PrepError::UnsupportedFormat(format!(
                "'{}' has no file extension",
                path.display()
            ))),
            other => Err(PrepError::UnsupportedFormat(format!(".{other}"))),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DelimitedText => write!(f, "csv"),
            Self::Spreadsheet => write!(f, "spreadsheet"),
            Self::StatisticalBinary => write!(f, "sav"),
        }
    }
}
