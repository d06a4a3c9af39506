//! mplusprep: turn tabular datasets into Mplus input files.
//!
//! A `.csv`, `.xlsx`, `.xls` or `.sav` file becomes a whitespace-delimited
//! data file (`<prefix>.dat`) and a model script (`<prefix>.inp`) for a
//! simple or moderated mediation analysis. Column names that Mplus cannot
//! accept are renamed (with consent) and the renames are recorded in
//! `<prefix>_variable_map.csv`.
//!
//! # Core Principles
//!
//! - **Consent before change**: latin1 decoding and renaming go through a
//!   [`ConfirmProvider`]
//! - **All or nothing up front**: no artifact is written until the data is
//!   known to fit the template
//! - **Traceable renames**: every changed name lands in the audit file
//!
//! # Example
//!
//! ```no_run
//! use mplusprep::{AnalysisMode, AutoConfirm, Converter};
//!
//! let converter = Converter::new(AutoConfirm::yes());
//! let report = converter
//!     .convert("survey.csv", "survey", AnalysisMode::Mediation)
//!     .unwrap();
//!
//! println!("Data: {}", report.data_file.display());
//! println!("Script: {}", report.script_file.display());
//! ```

pub mod error;
pub mod input;
pub mod naming;
pub mod output;
pub mod prompt;

mod convert;

pub use crate::convert::{
    AUDIT_SUFFIX, ConversionReport, ConvertConfig, Converter, DATA_SUFFIX, SCRIPT_SUFFIX,
    artifact_path,
};
pub use error::{PrepError, Result};
pub use input::{DataTable, Parser, ParserConfig, SourceFormat, SourceMetadata, Value};
pub use naming::{RenameMap, find_illegal, is_legal, sanitize};
pub use output::{AnalysisMode, DataFormat, TemplateOptions};
pub use prompt::{AutoConfirm, ConfirmProvider, Question};
