//! Convert command - produce the Mplus data file, script and rename audit.

use std::path::{Path, PathBuf};

use colored::Colorize;
use mplusprep::{AnalysisMode, AutoConfirm, ConfirmProvider, ConversionReport, Converter};

use crate::prompt::TerminalConfirm;

pub fn run(
    input: PathBuf,
    prefix: PathBuf,
    mode: AnalysisMode,
    assume_yes: bool,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }

    if !json_output {
        println!(
            "{} {} ({})",
            "Converting".cyan().bold(),
            input.display().to_string().white(),
            mode
        );
    }

    let report = if assume_yes {
        convert_with(AutoConfirm::yes(), &input, &prefix, mode)?
    } else {
        convert_with(TerminalConfirm, &input, &prefix, mode)?
    };

    if json_output {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn convert_with<P: ConfirmProvider>(
    provider: P,
    input: &Path,
    prefix: &Path,
    mode: AnalysisMode,
) -> mplusprep::Result<ConversionReport> {
    Converter::new(provider).convert(input, prefix, mode)
}

fn print_report(report: &ConversionReport) {
    let source = &report.source;
    println!(
        "  Read {} rows x {} columns ({}{})",
        source.row_count.to_string().white().bold(),
        source.column_count.to_string().white().bold(),
        source.format,
        source
            .encoding
            .as_ref()
            .map(|e| format!(", {e}"))
            .unwrap_or_default()
    );

    if let Some(map) = &report.rename_map {
        println!();
        println!("{}", "Renamed variables:".yellow().bold());
        for (original, generated) in map.changed() {
            println!("  {} -> {}", original, generated.green());
        }
    }

    println!();
    println!("{}", "Written:".green().bold());
    println!("  Data:    {}", report.data_file.display());
    println!("  Script:  {}", report.script_file.display());
    if let Some(audit) = &report.audit_file {
        println!("  Renames: {}", audit.display());
    }

    let roles = report.mode.roles();
    let bound: Vec<String> = roles
        .iter()
        .zip(&report.columns)
        .map(|(role, column)| format!("{role}={column}"))
        .collect();
    println!();
    println!("Roles: {}", bound.join(" ").cyan());
}
