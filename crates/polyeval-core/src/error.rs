//! Error types and exit codes for polyeval
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure (I/O, model failures, invalid benchmark)
//! - 2: Usage error (bad flags/args, unknown metric or task)
//! - 3: Data error (malformed dataset, missing split, unknown dataset)

mod macros;

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the polyeval CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args (2)
    Usage = 2,
    /// Data error - malformed dataset or config (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Errors that can occur while benchmarking
#[derive(Error, Debug)]
pub enum BenchError {
    // Usage errors (exit code 2)
    #[error("{0}")]
    UsageError(String),

    #[error("invalid {context}: {value}")]
    InvalidValue { context: String, value: String },

    #[error("unsupported {context}: {value} (supported: {supported})")]
    Unsupported {
        context: String,
        value: String,
        supported: String,
    },

    // Data errors (exit code 3)
    #[error("malformed dataset {dataset}: {reason}")]
    DatasetShape { dataset: String, reason: String },

    #[error("invalid custom datasets file {path:?}: {reason}")]
    InvalidDatasetsFile { path: PathBuf, reason: String },

    #[error("{context} not found: {value}")]
    NotFound { context: String, value: String },

    #[error("{context} already exists: {value}")]
    AlreadyExists { context: String, value: String },

    // Generic failures (exit code 1)
    #[error("cannot cache {outputs} outputs for {inputs} inputs")]
    CacheLengthMismatch { inputs: usize, outputs: usize },

    #[error("model {model} failed: {reason}")]
    ModelFailure { model: String, reason: String },

    #[error("invalid benchmark: metric {metric} failed after {attempts} attempt(s): {reason}")]
    InvalidBenchmark {
        metric: String,
        attempts: u32,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to {operation} {target}: {reason}")]
    FailedOperationWithTarget {
        operation: String,
        target: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl BenchError {
    /// Create an error for a failed IO operation with context
    pub fn io_operation(
        operation: &str,
        path: impl std::fmt::Display,
        error: impl std::fmt::Display,
    ) -> Self {
        BenchError::FailedOperationWithTarget {
            operation: operation.to_string(),
            target: path.to_string(),
            reason: error.to_string(),
        }
    }

    /// Create an error for an invalid value or configuration
    pub fn invalid_value(context: &str, value: impl std::fmt::Display) -> Self {
        BenchError::InvalidValue {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an unsupported value
    pub fn unsupported(
        context: &str,
        value: impl std::fmt::Display,
        supported: impl std::fmt::Display,
    ) -> Self {
        BenchError::Unsupported {
            context: context.to_string(),
            value: value.to_string(),
            supported: supported.to_string(),
        }
    }

    /// Create an error for an entity that was not found
    pub fn not_found(context: &str, value: impl std::fmt::Display) -> Self {
        BenchError::NotFound {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an entity that already exists
    pub fn already_exists(context: &str, value: impl std::fmt::Display) -> Self {
        BenchError::AlreadyExists {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for a dataset with the wrong shape
    pub fn dataset_shape(dataset: &str, reason: impl std::fmt::Display) -> Self {
        BenchError::DatasetShape {
            dataset: dataset.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an error for a model backend failure
    pub fn model_failure(model: &str, reason: impl std::fmt::Display) -> Self {
        BenchError::ModelFailure {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BenchError::UsageError(_)
            | BenchError::InvalidValue { .. }
            | BenchError::Unsupported { .. } => ExitCode::Usage,

            BenchError::DatasetShape { .. }
            | BenchError::InvalidDatasetsFile { .. }
            | BenchError::NotFound { .. }
            | BenchError::AlreadyExists { .. } => ExitCode::Data,

            BenchError::CacheLengthMismatch { .. }
            | BenchError::ModelFailure { .. }
            | BenchError::InvalidBenchmark { .. }
            | BenchError::Io(_)
            | BenchError::Json(_)
            | BenchError::Toml(_)
            | BenchError::Yaml(_)
            | BenchError::FailedOperationWithTarget { .. }
            | BenchError::Other(_) => ExitCode::Failure,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            BenchError::UsageError(_) => "usage_error",
            BenchError::InvalidValue { .. } => "invalid_value",
            BenchError::Unsupported { .. } => "unsupported",
            BenchError::DatasetShape { .. } => "dataset_shape",
            BenchError::InvalidDatasetsFile { .. } => "invalid_datasets_file",
            BenchError::NotFound { .. } => "not_found",
            BenchError::AlreadyExists { .. } => "already_exists",
            BenchError::CacheLengthMismatch { .. } => "cache_length_mismatch",
            BenchError::ModelFailure { .. } => "model_failure",
            BenchError::InvalidBenchmark { .. } => "invalid_benchmark",
            BenchError::Io(_) => "io_error",
            BenchError::Json(_) => "json_error",
            BenchError::Toml(_) => "toml_error",
            BenchError::Yaml(_) => "yaml_error",
            BenchError::FailedOperationWithTarget { .. } => "failed_operation_with_target",
            BenchError::Other(_) => "other",
        }
    }

    /// Convert error to JSON representation for structured error output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.exit_code() as i32,
                "type": self.error_type(),
                "message": self.to_string(),
            }
        })
    }
}

/// Result type alias for polyeval operations
pub type Result<T> = std::result::Result<T, BenchError>;
