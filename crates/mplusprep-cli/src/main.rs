//! mplusprep CLI - prepare Mplus mediation analyses from tabular data.

mod cli;
mod commands;
mod logging;
mod prompt;

use clap::{CommandFactory, Parser};
use cli::{Cli, USAGE_EXAMPLES};
use colored::Colorize;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => fail(e.to_string().trim_end()),
    };

    logging::init_logging(cli.verbose);

    let Some(input) = cli.input.clone() else {
        if let Err(e) = Cli::command().print_help() {
            fail(&e.to_string());
        }
        return;
    };

    let prefix = cli.prefix(&input);
    let result = commands::convert::run(input, prefix, cli.mode(), cli.yes, cli.json);

    if let Err(e) = result {
        fail(&e.to_string());
    }
}

/// Report `message` with the usage examples and exit with status 1.
fn fail(message: &str) -> ! {
    let message = message.strip_prefix("error: ").unwrap_or(message);
    eprintln!("{} {}", "Error:".red().bold(), message);
    eprintln!();
    eprintln!("Examples:");
    for example in USAGE_EXAMPLES {
        eprintln!("  {example}");
    }
    std::process::exit(1);
}
