//! Mplus input script rendering for the mediation templates.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use crate::error::{PrepError, Result};

use super::{AnalysisMode, create_artifact};

/// Value multiplying `a3` in the moderated indirect effect.
///
/// With `0` the interaction term drops out and the result equals the
/// indirect effect at W = 0. Set [`TemplateOptions::moderator_probe`] to a
/// probed moderator value (for example its mean) to keep the a3 path.
pub const DEFAULT_MODERATOR_PROBE: &str = "0";

/// Name of the derived interaction variable in moderated mediation.
pub const INTERACTION_TERM: &str = "XW";

const NAMES_PER_LINE: usize = 5;
const NAMES_INDENT: &str = "    ";

/// Tunable parts of the model templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Value substituted for the moderator in `INDIRECT = (a1 + a3*<probe>)*b`.
    pub moderator_probe: String,
    /// Bootstrap draws requested in the ANALYSIS section.
    pub bootstrap_draws: u32,
    /// Missing-value flag for the VARIABLE section; `None` omits the line.
    pub missing_token: Option<String>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            moderator_probe: DEFAULT_MODERATOR_PROBE.to_string(),
            bootstrap_draws: 5000,
            missing_token: None,
        }
    }
}

/// Render the model script for `columns`, whose leading entries are the role variables.
pub fn render_script<S: AsRef<str>>(
    columns: &[S],
    mode: AnalysisMode,
    data_path: &Path,
    options: &TemplateOptions,
) -> Result<String> {
    let required = mode.role_count();
    if columns.len() < required {
        return Err(PrepError::NotEnoughColumns {
            mode,
            required,
            found: columns.len(),
        });
    }

    let names: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    if mode == AnalysisMode::ModeratedMediation
        && names.iter().any(|n| n.eq_ignore_ascii_case(INTERACTION_TERM))
    {
        tracing::warn!(
            term = INTERACTION_TERM,
            "a data column shares its name with the derived interaction term"
        );
    }

    let mut out = String::new();
    match mode {
        AnalysisMode::Mediation => render_mediation(&mut out, &names, data_path, options)?,
        AnalysisMode::ModeratedMediation => {
            render_moderated(&mut out, &names, data_path, options)?
        }
    }

    Ok(out)
}

/// Render the script and write it to `path`.
pub fn write_script<S: AsRef<str>>(
    columns: &[S],
    mode: AnalysisMode,
    data_path: &Path,
    options: &TemplateOptions,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let script = render_script(columns, mode, data_path, options)?;

    let mut writer = create_artifact(path)?;
    writer
        .write_all(script.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|e| PrepError::io(path, e))?;

    tracing::debug!(path = %path.display(), %mode, "wrote model script");
    Ok(())
}

fn render_mediation(
    out: &mut String,
    names: &[&str],
    data_path: &Path,
    options: &TemplateOptions,
) -> std::fmt::Result {
    let (x, m, y) = (names[0], names[1], names[2]);

    writeln!(out, "TITLE: Simple mediation model (X M Y);")?;
    writeln!(out)?;
    render_preamble(out, names, data_path, options)?;
    writeln!(out, "  USEVARIABLES = {x} {m} {y};")?;
    writeln!(out)?;
    render_analysis(out, options)?;
    writeln!(out, "MODEL:")?;
    writeln!(out, "  {m} ON {x} (a);")?;
    writeln!(out, "  {y} ON {m} (b);")?;
    writeln!(out, "  {y} ON {x} (c);")?;
    writeln!(out)?;
    writeln!(out, "MODEL CONSTRAINT:")?;
    writeln!(out, "  NEW(DIRECT INDIRECT TOTAL);")?;
    writeln!(out, "  INDIRECT = a*b;")?;
    writeln!(out, "  DIRECT = c;")?;
    writeln!(out, "  TOTAL = DIRECT + INDIRECT;")?;
    writeln!(out)?;
    render_output(out)
}

fn render_moderated(
    out: &mut String,
    names: &[&str],
    data_path: &Path,
    options: &TemplateOptions,
) -> std::fmt::Result {
    let (x, m, y, w) = (names[0], names[1], names[2], names[3]);
    let xw = INTERACTION_TERM;

    writeln!(out, "TITLE: Moderated mediation model;")?;
    writeln!(out)?;
    render_preamble(out, names, data_path, options)?;
    writeln!(out, "  USEVARIABLES = {x} {m} {y} {w} {xw};")?;
    writeln!(out)?;
    writeln!(out, "DEFINE:")?;
    writeln!(out, "  {xw} = {x}*{w};")?;
    writeln!(out)?;
    render_analysis(out, options)?;
    writeln!(out, "MODEL:")?;
    writeln!(out, "  {m} ON {x} (a1) {w} (a2) {xw} (a3);")?;
    writeln!(out, "  {y} ON {m} (b) {x};")?;
    writeln!(out)?;
    writeln!(out, "MODEL CONSTRAINT:")?;
    writeln!(out, "  NEW(INDIRECT);")?;
    writeln!(out, "  INDIRECT = (a1 + a3*{})*b;", options.moderator_probe)?;
    writeln!(out)?;
    render_output(out)
}

/// DATA and VARIABLE sections up to (not including) USEVARIABLES.
fn render_preamble(
    out: &mut String,
    names: &[&str],
    data_path: &Path,
    options: &TemplateOptions,
) -> std::fmt::Result {
    writeln!(out, "DATA:")?;
    writeln!(out, "  FILE = {};", data_path.display())?;
    writeln!(out)?;
    writeln!(out, "VARIABLE:")?;
    writeln!(out, "  NAMES =")?;
    writeln!(out, "{};", format_names(names))?;
    if let Some(token) = &options.missing_token {
        writeln!(out, "  MISSING = {token};")?;
    }
    writeln!(out)
}

fn render_analysis(out: &mut String, options: &TemplateOptions) -> std::fmt::Result {
    writeln!(out, "ANALYSIS:")?;
    writeln!(out, "  ESTIMATOR = MLR;")?;
    writeln!(out, "  BOOTSTRAP = {};", options.bootstrap_draws)?;
    writeln!(out)
}

fn render_output(out: &mut String) -> std::fmt::Result {
    writeln!(out, "OUTPUT:")?;
    writeln!(out, "  STANDARDIZED CINTERVAL(BOOTSTRAP);")
}

/// Names five per line, each line indented by four spaces.
fn format_names(names: &[&str]) -> String {
    names
        .chunks(NAMES_PER_LINE)
        .map(|chunk| format!("{NAMES_INDENT}{}", chunk.join(" ")))
        .collect::<Vec<_>>()
        .join("\n")
}
