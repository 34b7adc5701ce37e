//! Benchmark configuration
//!
//! Settings are read from a TOML file (by default `~/.config/polyeval/config.toml`,
//! or `$POLYEVAL_CONFIG_DIR/config.toml`). Every field has a default, so an
//! empty or missing file is valid. The CLI overrides individual fields.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bail_invalid;
use crate::error::{BenchError, Result};

const CONFIG_DIR: &str = "polyeval";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_DIR_ENV_VAR: &str = "POLYEVAL_CONFIG_DIR";
const CACHE_DIR_ENV_VAR: &str = "POLYEVAL_CACHE_DIR";

/// Default number of bootstrap iterations per dataset
pub const DEFAULT_NUM_ITERATIONS: usize = 10;
/// Default seed for bootstrap resampling
pub const DEFAULT_SEED: u64 = 4242;
/// Default attempt budget for metrics hitting resource limits
pub const DEFAULT_METRIC_MAX_ATTEMPTS: u32 = 5;

/// Settings shared by every dataset in a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Root of the model output caches
    pub cache_dir: PathBuf,

    /// JSONL file where finished benchmark results are appended
    pub results_path: PathBuf,

    /// Number of bootstrap resamples scored per dataset
    pub num_iterations: usize,

    /// Seed for the bootstrap resampler
    pub seed: u64,

    /// Score the real test split; when false the validation split stands in
    pub evaluate_test_split: bool,

    /// Keep only the first test example, for fast smoke runs
    pub smoke_test: bool,

    /// Store raw inputs as cache keys instead of hashes
    pub debug: bool,

    /// Delete each dataset's model cache once it has been scored
    pub clear_model_cache: bool,

    /// Re-run datasets that already have a stored result
    pub force: bool,

    /// Attempts per metric before a resource failure invalidates the run
    pub metric_max_attempts: u32,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".polyeval_cache"),
            results_path: PathBuf::from("polyeval_benchmark_results.jsonl"),
            num_iterations: DEFAULT_NUM_ITERATIONS,
            seed: DEFAULT_SEED,
            evaluate_test_split: false,
            smoke_test: false,
            debug: false,
            clear_model_cache: false,
            force: false,
            metric_max_attempts: DEFAULT_METRIC_MAX_ATTEMPTS,
        }
    }
}

impl BenchmarkConfig {
    /// Default location of the user config file
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if let Ok(env_dir) = std::env::var(CONFIG_DIR_ENV_VAR) {
            PathBuf::from(env_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| {
                    BenchError::Other("unable to determine config directory".to_string())
                })?
                .join(CONFIG_DIR)
        };
        Ok(config_dir.join(CONFIG_FILE))
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BenchError::io_operation("read config", path.display(), e))?;
        let mut config: BenchmarkConfig = toml::from_str(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or defaults when the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Ok(path) => path,
                Err(_) => return Ok(Self::default().with_env()),
            },
        };

        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default().with_env())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| BenchError::Other(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings no benchmark can run with
    pub fn validate(&self) -> Result<()> {
        if self.num_iterations == 0 {
            bail_invalid!("num_iterations", "0 (must be at least 1)");
        }
        if self.metric_max_attempts == 0 {
            bail_invalid!("metric_max_attempts", "0 (must be at least 1)");
        }
        Ok(())
    }

    /// Whether cache keys are hashed; debug runs keep them readable
    pub fn hash_inputs(&self) -> bool {
        !self.debug
    }

    fn with_env(mut self) -> Self {
        self.apply_env();
        self
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV_VAR) {
            self.cache_dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.num_iterations, 10);
        assert_eq!(config.seed, 4242);
        assert_eq!(config.metric_max_attempts, 5);
        assert!(!config.evaluate_test_split);
        assert!(config.hash_inputs());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = BenchmarkConfig {
            num_iterations: 3,
            evaluate_test_split: true,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = BenchmarkConfig::load(&path).unwrap();
        assert_eq!(loaded.num_iterations, 3);
        assert!(loaded.evaluate_test_split);
        assert_eq!(loaded.seed, config.seed);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "seed = 7\n").unwrap();

        let loaded = BenchmarkConfig::load(&path).unwrap();
        assert_eq!(loaded.seed, 7);
        assert_eq!(loaded.num_iterations, DEFAULT_NUM_ITERATIONS);
    }

    #[test]
    fn test_missing_explicit_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let loaded =
            BenchmarkConfig::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(loaded.num_iterations, DEFAULT_NUM_ITERATIONS);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "num_iterations = 0\n").unwrap();
        assert!(matches!(
            BenchmarkConfig::load(&path),
            Err(BenchError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_debug_disables_hashing() {
        let config = BenchmarkConfig {
            debug: true,
            ..Default::default()
        };
        assert!(!config.hash_inputs());
    }
}
