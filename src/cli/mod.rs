//! CLI argument parsing for polyeval
//!
//! Global flags: --format, --quiet, --verbose, --log-level, --log-json, --config

pub mod output;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;
pub use run::RunArgs;

/// Polyeval - multilingual language model benchmark harness
#[derive(Parser, Debug)]
#[command(name = "polyeval")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Debug-level logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log filter, e.g. `debug` or `polyeval_core=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Benchmark config file (TOML); defaults to the user config if present
    #[arg(long, global = true, env = "POLYEVAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Benchmark a model on one or more datasets
    Run(RunArgs),

    /// List the datasets declared in a custom datasets file
    Datasets {
        /// TOML or YAML file with `dataset` entries
        #[arg(long)]
        datasets: PathBuf,

        /// Only datasets covering this language code
        #[arg(long)]
        language: Option<String>,
    },

    /// Show recorded benchmark results
    Results {
        /// Only results for this model
        #[arg(long)]
        model: Option<String>,

        /// Only results for this dataset
        #[arg(long)]
        dataset: Option<String>,
    },

    /// Inspect or clear model output caches
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Aggregate raw per-iteration scores from a JSON file
    Aggregate {
        /// JSON array of `{"test_<metric>": score}` objects
        file: PathBuf,

        /// Metric to aggregate (repeatable)
        #[arg(long = "metric", required = true)]
        metrics: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show the cache file of a model on a dataset
    Show {
        #[arg(long)]
        model: String,

        #[arg(long)]
        dataset: String,

        /// Custom datasets file declaring the dataset
        #[arg(long)]
        datasets: PathBuf,
    },

    /// Delete cached outputs of a model, for one dataset or all of them
    Clear {
        #[arg(long)]
        model: String,

        #[arg(long)]
        dataset: Option<String>,
    },
}
