//! Conversion pipeline: ingest, validate names, write the Mplus artifacts.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::input::{Parser, ParserConfig, SourceMetadata};
use crate::naming::{RenameMap, find_illegal, sanitize};
use crate::output::{
    AnalysisMode, DataFormat, TemplateOptions, write_data_file, write_rename_audit, write_script,
};
use crate::prompt::{ConfirmProvider, Question};

/// Suffix of the data file.
pub const DATA_SUFFIX: &str = ".dat";
/// Suffix of the model script.
pub const SCRIPT_SUFFIX: &str = ".inp";
/// Suffix of the rename audit.
pub const AUDIT_SUFFIX: &str = "_variable_map.csv";

/// Configuration for a conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertConfig {
    /// Input parsing.
    pub parser: ParserConfig,
    /// Data file rendering.
    pub data: DataFormat,
    /// Model script rendering.
    pub template: TemplateOptions,
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Metadata about the source file.
    pub source: SourceMetadata,
    /// Template that was rendered.
    pub mode: AnalysisMode,
    /// Column names as written, in order.
    pub columns: Vec<String>,
    /// Names that failed validation before renaming.
    pub illegal_names: Vec<String>,
    /// Original to generated names, present when renaming happened.
    pub rename_map: Option<RenameMap>,
    /// Absolute path of the data file.
    pub data_file: PathBuf,
    /// Absolute path of the model script.
    pub script_file: PathBuf,
    /// Absolute path of the rename audit, when one was written.
    pub audit_file: Option<PathBuf>,
}

impl ConversionReport {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of columns whose name changed.
    pub fn renamed_count(&self) -> usize {
        self.rename_map
            .as_ref()
            .map_or(0, |map| map.changed().count())
    }
}

/// Converts a dataset into Mplus input artifacts.
pub struct Converter<P: ConfirmProvider> {
    config: ConvertConfig,
    parser: Parser,
    provider: P,
}

impl<P: ConfirmProvider> Converter<P> {
    /// Create a converter with default configuration.
    pub fn new(provider: P) -> Self {
        Self::with_config(ConvertConfig::default(), provider)
    }

    /// Create a converter with custom configuration.
    pub fn with_config(config: ConvertConfig, provider: P) -> Self {
        let parser = Parser::with_config(config.parser.clone());
        Self {
            config,
            parser,
            provider,
        }
    }

    /// Convert `input` into `<prefix>.dat`, `<prefix>.inp` and, when names
    /// were rewritten, `<prefix>_variable_map.csv`.
    ///
    /// Nothing is written if ingestion fails, renaming is declined or the
    /// table has too few columns for `mode`. Writing stops at the first
    /// failed artifact.
    pub fn convert(
        &self,
        input: impl AsRef<Path>,
        prefix: impl AsRef<Path>,
        mode: AnalysisMode,
    ) -> Result<ConversionReport> {
        let input = input.as_ref();
        let prefix = prefix.as_ref();

        let (mut table, source) = self.parser.parse_file(input, &self.provider)?;

        let illegal_names = find_illegal(&table.headers);
        let rename_map = if illegal_names.is_empty() {
            None
        } else {
            tracing::info!(count = illegal_names.len(), names = ?illegal_names, "illegal Mplus names");
            let question = Question::SanitizeNames {
                illegal: illegal_names.clone(),
            };
            if !self.provider.confirm(&question) {
                return Err(PrepError::Naming {
                    illegal: illegal_names,
                });
            }
            let map = sanitize(&table.headers);
            table.rename_columns(&map);
            for (original, generated) in map.changed() {
                tracing::debug!(original, generated, "renamed column");
            }
            Some(map)
        };

        let required = mode.role_count();
        if table.column_count() < required {
            return Err(PrepError::NotEnoughColumns {
                mode,
                required,
                found: table.column_count(),
            });
        }

        let data_file = absolute(&artifact_path(prefix, DATA_SUFFIX))?;
        write_data_file(&table, &data_file, &self.config.data)?;

        let mut options = self.config.template.clone();
        if table.has_missing() {
            options.missing_token = Some(self.config.data.missing_token.clone());
        }
        let script_file = absolute(&artifact_path(prefix, SCRIPT_SUFFIX))?;
        write_script(&table.headers, mode, &data_file, &options, &script_file)?;

        let audit_file = match &rename_map {
            Some(map) => {
                let path = absolute(&artifact_path(prefix, AUDIT_SUFFIX))?;
                write_rename_audit(map, &path)?;
                Some(path)
            }
            None => None,
        };

        tracing::info!(
            data = %data_file.display(),
            script = %script_file.display(),
            %mode,
            "conversion complete"
        );

        Ok(ConversionReport {
            source,
            mode,
            columns: table.headers,
            illegal_names,
            rename_map,
            data_file,
            script_file,
            audit_file,
        })
    }
}

/// `<prefix><suffix>`, appended to the prefix verbatim.
pub fn artifact_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| PrepError::io(path, e))
}
