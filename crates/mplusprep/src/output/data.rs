//! Whitespace-delimited Mplus data file.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use crate::error::{PrepError, Result};
use crate::input::{DataTable, Value};

use super::create_artifact;

/// How cells are rendered in the data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFormat {
    /// Fractional digits for numeric values.
    pub precision: usize,
    /// Token written for missing values; must match `MISSING` in the script.
    pub missing_token: String,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self {
            precision: 6,
            missing_token: ".".to_string(),
        }
    }
}

impl DataFormat {
    /// Render a single cell. The result never contains whitespace.
    pub fn render<'a>(&'a self, value: &'a Value) -> Cow<'a, str> {
        match value {
            Value::Number(n) => Cow::Owned(format!("{:.*}", self.precision, n)),
            Value::Text(s) if s.trim().is_empty() => Cow::Borrowed(self.missing_token.as_str()),
            Value::Text(s) if s.chars().any(char::is_whitespace) => {
                Cow::Owned(s.split_whitespace().collect::<Vec<_>>().join("_"))
            }
            Value::Text(s) => Cow::Borrowed(s.as_str()),
            Value::Missing => Cow::Borrowed(self.missing_token.as_str()),
        }
    }

    /// Render one row as a single line without the trailing newline.
    pub fn render_row(&self, row: &[Value]) -> String {
        row.iter()
            .map(|v| self.render(v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Write the table's rows (never its header) to `path`, one line per row.
pub fn write_data_file(table: &DataTable, path: impl AsRef<Path>, format: &DataFormat) -> Result<()> {
    let path = path.as_ref();
    let non_numeric = table.non_numeric_columns();
    if !non_numeric.is_empty() {
        tracing::warn!(
            columns = ?non_numeric,
            "non-numeric values written verbatim; Mplus will reject them"
        );
    }

    let mut writer = create_artifact(path)?;
    for row in &table.rows {
        writeln!(writer, "{}", format.render_row(row)).map_err(|e| PrepError::io(path, e))?;
    }
    writer.flush().map_err(|e| PrepError::io(path, e))?;

    tracing::debug!(path = %path.display(), rows = table.row_count(), "wrote data file");
    Ok(())
}
