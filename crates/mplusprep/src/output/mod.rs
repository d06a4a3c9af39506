//! Artifact writers: the Mplus data file, the model script and the rename audit.

mod audit;
mod data;
mod script;

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

pub use audit::write_rename_audit;
pub use data::{DataFormat, write_data_file};
pub use script::{
    DEFAULT_MODERATOR_PROBE, INTERACTION_TERM, TemplateOptions, render_script, write_script,
};

/// Which model template to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// X -> M -> Y with a direct X -> Y path.
    #[default]
    Mediation,
    /// Mediation with the X -> M path moderated by W.
    ModeratedMediation,
}

impl AnalysisMode {
    /// Number of leading columns taken as role variables.
    pub fn role_count(self) -> usize {
        match self {
            Self::Mediation => 3,
            Self::ModeratedMediation => 4,
        }
    }

    /// Role names bound to the leading columns, in order.
    pub fn roles(self) -> &'static [&'static str] {
        match self {
            Self::Mediation => &["X", "M", "Y"],
            Self::ModeratedMediation => &["X", "M", "Y", "W"],
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mediation => write!(f, "mediation"),
            Self::ModeratedMediation => write!(f, "moderated mediation"),
        }
    }
}

/// Create (or truncate) an artifact file, creating missing parent directories.
fn create_artifact(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| PrepError::io(parent, e))?;
        }
    }

    let file = File::create(path).map_err(|e| PrepError::io(path, e))?;
    Ok(BufWriter::new(file))
}
