//! Error types for the mplusprep library.

use std::path::PathBuf;
use thiserror::Error;

use crate::output::AnalysisMode;

/// Main error type for conversion operations.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file does not exist.
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// File extension (or binary layout) not supported.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// No candidate encoding decoded the file and the fallback was refused.
    #[error("Could not decode '{path}' (tried {}); forced latin1 decoding was declined", .tried.join(", "))]
    Encoding { path: PathBuf, tried: Vec<String> },

    /// Illegal variable names were found and sanitizing them was declined.
    #[error("Illegal Mplus variable names ({}); automatic renaming was declined", .illegal.join(", "))]
    Naming { illegal: Vec<String> },

    /// The table has fewer columns than the model needs role variables.
    #[error("{mode} needs at least {required} columns, found {found}")]
    NotEnoughColumns {
        mode: AnalysisMode,
        required: usize,
        found: usize,
    },

    /// Error parsing delimited text.
    #[error("Parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error reading a spreadsheet workbook.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Malformed SPSS system file.
    #[error("SAV error: {0}")]
    Sav(String),

    /// Empty file or no data to convert.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Model script formatting error.
    #[error("Template rendering error: {0}")]
    Render(#[from] std::fmt::Error),
}

impl PrepError {
    /// Wrap an IO error for `path`, mapping `NotFound` to [`PrepError::FileNotFound`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Result type alias for mplusprep operations.
pub type Result<T> = std::result::Result<T, PrepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PrepError::UnsupportedFormat(".txt".to_string());
        assert_eq!(err.to_string(), "Unsupported file format: .txt");

        let err = PrepError::Naming {
            illegal: vec!["1stVar".to_string(), "Income(USD)".to_string()],
        };
        assert!(err.to_string().contains("1stVar, Income(USD)"));

        let err = PrepError::from(std::fmt::Error);
        assert!(matches!(err, PrepError::Render(_)));
        assert!(err.to_string().starts_with("Template rendering error"));
    }

    #[test]
    fn test_io_not_found_maps_to_file_not_found() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = PrepError::io("data.csv", source);
        assert!(matches!(err, PrepError::FileNotFound { .. }));

        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        let err = PrepError::io("data.csv", source);
        assert!(matches!(err, PrepError::Io { .. }));
    }
}
