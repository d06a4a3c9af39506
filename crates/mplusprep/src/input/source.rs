//! In-memory table and source metadata.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::naming::RenameMap;

use super::format::SourceFormat;

/// Cell text treated as a missing value (pandas' default NA tokens).
const NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Finite numeric value.
    Number(f64),
    /// Non-numeric text.
    Text(String),
    /// Missing value.
    Missing,
}

impl Value {
    /// Create a numeric value; NaN and infinities become [`Value::Missing`].
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            Self::Number(n)
        } else {
            Self::Missing
        }
    }

    /// Classify raw cell text as number, text or missing.
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if Self::is_null_value(trimmed) {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => Self::number(n),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    /// Check if a value represents a missing/null value.
    pub fn is_null_value(value: &str) -> bool {
        let trimmed = value.trim();
        trimmed.is_empty() || NULL_TOKENS.contains(&trimmed)
    }

    /// Whether this value is missing, counting blank text as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Get the numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Missing => Ok(()),
        }
    }
}

/// Represents parsed tabular data.
///
/// Every row holds exactly one value per header, and headers are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    /// Column headers.
    pub headers: Vec<String>,
    /// Row data (row-major order).
    pub rows: Vec<Vec<Value>>,
}

impl DataTable {
    /// Create a new data table.
    ///
    /// Headers are made unique and rows are padded (with missing values) or
    /// truncated to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let headers = unique_headers(headers);
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Missing);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Get the number of rows (excluding header).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get all values for a column by index.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Whether any cell is missing.
    pub fn has_missing(&self) -> bool {
        self.rows.iter().flatten().any(Value::is_missing)
    }

    /// Headers of columns holding at least one non-numeric, non-missing value.
    pub fn non_numeric_columns(&self) -> Vec<&str> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| {
                self.column_values(*idx)
                    .any(|v| matches!(v, Value::Text(s) if !s.trim().is_empty()))
            })
            .map(|(_, h)| h.as_str())
            .collect()
    }

    /// Replace headers through a rename map. Headers absent from the map keep their name.
    pub fn rename_columns(&mut self, map: &RenameMap) {
        for header in &mut self.headers {
            if let Some(new_name) = map.get(header) {
                *header = new_name.to_string();
            }
        }
    }
}

/// Make headers unique the way pandas does: blank headers become
/// `Unnamed: <index>`, repeats get `.1`, `.2`, ... suffixes.
pub fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::with_capacity(raw.len());

    for (idx, name) in raw.into_iter().enumerate() {
        let name = if name.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            name
        };

        let unique = if used.contains(&name) {
            let next = repeats.entry(name.clone()).or_insert(1);
            loop {
                let candidate = format!("{name}.{next}");
                *next += 1;
                if !used.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            name
        };

        used.insert(unique.clone());
        headers.push(unique);
    }

    headers
}

/// Metadata about the source data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// SHA-256 hash of the file contents.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected format.
    pub format: SourceFormat,
    /// Text encoding used for decoding, if the format carries text.
    pub encoding: Option<String>,
    /// Number of data rows (excluding header).
    pub row_count: usize,
    /// Number of columns.
    pub column_count: usize,
    /// When the file was ingested.
    pub ingested_at: DateTime<Utc>,
}

impl SourceMetadata {
    /// Create metadata for a file that has been ingested.
    pub fn new(
        path: PathBuf,
        hash: String,
        size_bytes: u64,
        format: SourceFormat,
        encoding: Option<String>,
        table: &DataTable,
    ) -> Self {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file,
            path,
            hash,
            size_bytes,
            format,
            encoding,
            row_count: table.row_count(),
            column_count: table.column_count(),
            ingested_at: Utc::now(),
        }
    }
}
