//! Polyeval - multilingual language model benchmark CLI
//!
//! Runs a model over benchmark datasets through a persistent output cache and
//! reports bootstrapped `mean ± half-width` scores.

mod cli;
mod commands;

use std::env;
use std::process::ExitCode;
use std::time::Instant;

use clap::error::ErrorKind;
use clap::Parser;

use cli::{Cli, OutputFormat};
use polyeval_core::error::{BenchError, ExitCode as BenchExitCode};
use polyeval_core::logging;

fn main() -> ExitCode {
    let start = Instant::now();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // `cli.format` is unknown when parsing fails, so look at argv directly
            match (requested_format(env::args().skip(1)), usage_error(&err)) {
                (OutputFormat::Json, Some(bench_error)) => {
                    return report(OutputFormat::Json, false, &bench_error)
                }
                _ => err.exit(),
            }
        }
    };

    if let Err(e) = logging::init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::debug!(elapsed = ?start.elapsed(), "parse_args");

    match commands::dispatch::run(&cli) {
        Ok(()) => ExitCode::from(BenchExitCode::Success as u8),
        Err(e) => report(cli.format, cli.quiet, &e),
    }
}

/// Print `err` in the requested format and turn it into the process exit code
fn report(format: OutputFormat, quiet: bool, err: &BenchError) -> ExitCode {
    match format {
        OutputFormat::Json => eprintln!("{}", err.to_json()),
        OutputFormat::Human if !quiet => eprintln!("error: {}", err),
        OutputFormat::Human => {}
    }
    ExitCode::from(err.exit_code() as u8)
}

/// Usage error for a failed parse; `None` for help and version output,
/// which clap prints itself
fn usage_error(err: &clap::Error) -> Option<BenchError> {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => None,
        _ => Some(BenchError::UsageError(err.to_string().trim_end().to_string())),
    }
}

/// Output format named on the command line, wherever `--format` appears
fn requested_format(args: impl IntoIterator<Item = String>) -> OutputFormat {
    let mut format = OutputFormat::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let value = match arg.strip_prefix("--format") {
            Some("") => args.next(),
            Some(rest) => rest.strip_prefix('=').map(str::to_string),
            None => continue,
        };
        match value.as_deref() {
            Some("json") => format = OutputFormat::Json,
            Some("human") => format = OutputFormat::Human,
            _ => {}
        }
    }
    format
}
