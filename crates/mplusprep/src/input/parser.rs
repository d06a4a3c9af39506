//! Format-dispatching parser for tabular sources.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{PrepError, Result};
use crate::prompt::ConfirmProvider;

use super::encoding::{CANDIDATE_ENCODINGS, decode_with_fallback};
use super::format::SourceFormat;
use super::sav::parse_sav;
use super::source::{DataTable, SourceMetadata, Value};
use super::spreadsheet::read_first_sheet;

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Field delimiter for delimited text.
    pub delimiter: u8,
    /// Quote character for delimited text.
    pub quote: u8,
    /// Encoding labels tried, in order, before the latin1 fallback.
    pub encodings: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            encodings: CANDIDATE_ENCODINGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Parses tabular data files into a [`DataTable`].
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// Create a new parser with default configuration.
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
        }
    }

    /// Create a parser with custom configuration.
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a file and return the data table and metadata.
    ///
    /// The format comes from the file extension. `provider` is consulted
    /// only if a delimited file matches none of the candidate encodings.
    pub fn parse_file(
        &self,
        path: impl AsRef<Path>,
        provider: &dyn ConfirmProvider,
    ) -> Result<(DataTable, SourceMetadata)> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)?;

        // Read file contents for hashing and parsing
        let mut file = File::open(path).map_err(|e| PrepError::io(path, e))?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| PrepError::io(path, e))?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let hash = format!("sha256:{:x}", hasher.finalize());

        let (table, encoding) = match format {
            SourceFormat::DelimitedText => {
                let decoded =
                    decode_with_fallback(&contents, path, &self.config.encodings, provider)?;
                (self.parse_text(&decoded.text)?, Some(decoded.encoding))
            }
            SourceFormat::Spreadsheet => (read_first_sheet(path)?, None),
            SourceFormat::StatisticalBinary => {
                let dataset = parse_sav(&contents)?;
                (dataset.table, Some(dataset.encoding))
            }
        };

        if table.column_count() == 0 {
            return Err(PrepError::EmptyData(format!(
                "no columns found in {}",
                path.display()
            )));
        }

        tracing::info!(
            path = %path.display(),
            %format,
            rows = table.row_count(),
            columns = table.column_count(),
            "ingested source"
        );

        let source = SourceMetadata::new(
            std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
            hash,
            contents.len() as u64,
            format,
            encoding,
            &table,
        );

        Ok((table, source))
    }

    /// Parse decoded delimited text. The first record is the header.
    fn parse_text(&self, text: &str) -> Result<DataTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .quote(self.config.quote)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();

        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(PrepError::EmptyData("No header row found".to_string()));
        }

        let expected_cols = headers.len();
        let mut rows = Vec::new();

        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;

            if record.len() > expected_cols {
                return Err(PrepError::Parse {
                    row: row_idx + 2,
                    message: format!(
                        "expected {} fields, saw {}",
                        expected_cols,
                        record.len()
                    ),
                });
            }

            rows.push(record.iter().map(Value::from_cell).collect());
        }

        Ok(DataTable::new(headers, rows))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::AutoConfirm;
    use std::io::Write;
    use tempfile::Builder;

    fn temp_file(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn test_parse_csv() {
        let parser = Parser::new();
        let table = parser
            .parse_text("name,age,city\nAlice,30,NYC\nBob,25,\n")
            .unwrap();

        assert_eq!(table.headers, vec!["name", "age", "city"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, 0), Some(&Value::Text("Alice".to_string())));
        assert_eq!(table.get(1, 1), Some(&Value::Number(25.0)));
        assert_eq!(table.get(1, 2), Some(&Value::Missing));
    }

    #[test]
    fn test_parse_short_and_long_rows() {
        let parser = Parser::new();
        let table = parser.parse_text("a,b,c\n1,2\n").unwrap();
        assert_eq!(table.get(0, 2), Some(&Value::Missing));

        let err = parser.parse_text("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, PrepError::Parse { row: 2, .. }));
    }

    #[test]
    fn test_parse_quoted_fields() {
        let parser = Parser::new();
        let table = parser
            .parse_text("\"Income, USD\",y\n\"1,5\",2\n")
            .unwrap();
        assert_eq!(table.headers[0], "Income, USD");
        assert_eq!(table.get(0, 0), Some(&Value::Text("1,5".to_string())));
    }

    #[test]
    fn test_parse_file_metadata() {
        let file = temp_file(".csv", b"X,M,Y\n1,2,3\n4,5,6\n");
        let (table, source) = Parser::new()
            .parse_file(file.path(), &AutoConfirm::no())
            .unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(source.row_count, 2);
        assert_eq!(source.column_count, 3);
        assert_eq!(source.format, SourceFormat::DelimitedText);
        assert_eq!(source.encoding.as_deref(), Some("UTF-8"));
        assert!(source.hash.starts_with("sha256:"));
        assert!(source.path.is_absolute());
    }

    #[test]
    fn test_parse_file_unsupported() {
        let file = temp_file(".txt", b"X,M,Y\n");
        let err = Parser::new()
            .parse_file(file.path(), &AutoConfirm::no())
            .unwrap_err();
        assert!(matches!(err, PrepError::UnsupportedFormat(ref ext) if ext == ".txt"));
    }

    #[test]
    fn test_parse_file_not_found() {
        let err = Parser::new()
            .parse_file("/nonexistent/data.csv", &AutoConfirm::no())
            .unwrap_err();
        assert!(matches!(err, PrepError::FileNotFound { .. }));
    }

    #[test]
    fn test_empty_csv() {
        let file = temp_file(".csv", b"");
        let err = Parser::new()
            .parse_file(file.path(), &AutoConfirm::no())
            .unwrap_err();
        assert!(matches!(err, PrepError::EmptyData(_)));
    }
}
