use std::path::PathBuf;

use clap::Args;

use polyeval_core::config::BenchmarkConfig;

/// Arguments of `polyeval run`. Flags override the config file.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Model identifier; scopes the output cache and the results
    #[arg(long)]
    pub model: String,

    /// Shell command producing one output per JSON input on stdin
    #[arg(long)]
    pub command: String,

    /// TOML or YAML file with `dataset` entries
    #[arg(long)]
    pub datasets: PathBuf,

    /// Only this dataset (repeatable)
    #[arg(long = "dataset")]
    pub dataset_names: Vec<String>,

    /// Only datasets covering this language code (repeatable)
    #[arg(long = "language")]
    pub languages: Vec<String>,

    /// Model command invocations running at once
    #[arg(long, default_value_t = 4)]
    pub max_concurrent: usize,

    #[arg(long)]
    pub num_iterations: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    #[arg(long)]
    pub results_path: Option<PathBuf>,

    /// Score the test split instead of the validation split
    #[arg(long)]
    pub evaluate_test_split: bool,

    /// Score a single test example per dataset
    #[arg(long)]
    pub smoke_test: bool,

    /// Keep raw inputs as cache keys
    #[arg(long)]
    pub debug: bool,

    /// Delete each dataset's cache after scoring it
    #[arg(long)]
    pub clear_model_cache: bool,

    /// Re-run datasets that already have results
    #[arg(long)]
    pub force: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of a loaded config
    pub fn apply(&self, mut config: BenchmarkConfig) -> BenchmarkConfig {
        if let Some(n) = self.num_iterations {
            config.num_iterations = n;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(path) = &self.results_path {
            config.results_path = path.clone();
        }
        config.evaluate_test_split |= self.evaluate_test_split;
        config.smoke_test |= self.smoke_test;
        config.debug |= self.debug;
        config.clear_model_cache |= self.clear_model_cache;
        config.force |= self.force;
        config
    }
}
