//! Input parsing and data source handling.

pub mod encoding;
mod format;
mod parser;
pub mod sav;
mod source;
mod spreadsheet;

pub use format::SourceFormat;
pub use parser::{Parser, ParserConfig};
pub use source::{DataTable, SourceMetadata, Value, unique_headers};
