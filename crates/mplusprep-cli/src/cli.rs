//! CLI argument definitions using clap.

use clap::Parser;
use mplusprep::AnalysisMode;
use std::path::PathBuf;

/// Usage examples printed after an error.
pub const USAGE_EXAMPLES: &[&str] = &[
    "mplusprep data.csv",
    "mplusprep data.xlsx -w",
    "mplusprep data.sav -o output",
];

/// mplusprep: convert a dataset into Mplus mediation input files
#[derive(Parser, Debug)]
#[command(name = "mplusprep")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:\n  mplusprep data.csv\n  mplusprep data.xlsx -w\n  mplusprep data.sav -o output")]
pub struct Cli {
    /// Input dataset (.csv, .xlsx, .xls, .sav)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Simple mediation model: X -> M -> Y (default)
    #[arg(short = 'm', long = "mediation", conflicts_with = "moderated")]
    pub mediation: bool,

    /// Moderated mediation model: W moderates X -> M
    #[arg(short = 'w', long = "moderated")]
    pub moderated: bool,

    /// Output prefix (default: input file name without extension)
    #[arg(short = 'o', long = "output", value_name = "PREFIX")]
    pub output: Option<PathBuf>,

    /// Answer yes to every prompt
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Print the conversion report as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Selected template; mediation unless `-w` was given.
    pub fn mode(&self) -> AnalysisMode {
        if self.moderated {
            AnalysisMode::ModeratedMediation
        } else {
            AnalysisMode::Mediation
        }
    }

    /// Output prefix: `-o` if given, else the input's file stem in the working directory.
    pub fn prefix(&self, input: &std::path::Path) -> PathBuf {
        match &self.output {
            Some(prefix) => prefix.clone(),
            None => PathBuf::from(input.file_stem().unwrap_or(input.as_os_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_mode_and_prefix() {
        let cli = Cli::try_parse_from(["mplusprep", "dir/survey.csv"]).unwrap();
        assert_eq!(cli.mode(), AnalysisMode::Mediation);
        let input = cli.input.clone().unwrap();
        assert_eq!(cli.prefix(&input), PathBuf::from("survey"));
    }

    #[test]
    fn test_moderated_with_prefix() {
        let cli = Cli::try_parse_from(["mplusprep", "data.xlsx", "-w", "-o", "out/run1"]).unwrap();
        assert_eq!(cli.mode(), AnalysisMode::ModeratedMediation);
        assert_eq!(cli.prefix(std::path::Path::new("data.xlsx")), PathBuf::from("out/run1"));
    }

    #[test]
    fn test_mode_flags_conflict() {
        let err = Cli::try_parse_from(["mplusprep", "data.csv", "-m", "-w"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_verbosity_count() {
        let cli = Cli::try_parse_from(["mplusprep", "data.csv", "-vv", "--json", "-y"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert!(cli.yes);
    }
}
