//! Dataset configurations and the registry that holds them.
//!
//! The registry is an ordinary value: build it, register configs into it, and
//! pass it to whatever needs to look datasets up. Custom datasets are declared
//! in a TOML or YAML file and loaded through [`load_custom_datasets`], which
//! validates each entry against the schema below:
//!
//! ```toml
//! [[dataset]]
//! name = "angry-tweets"
//! task = "classification"
//! languages = ["da"]
//! source = "data/angry-tweets.json"
//! labels = ["positive", "neutral", "negative"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::validate_dataset_name;
use crate::error::{BenchError, Result};
use crate::metrics::METRIC_NAMES;

/// Kind of benchmark task a dataset belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    Classification,
    NamedEntityRecognition,
    QuestionAnswering,
    Summarization,
    MultipleChoice,
    ToolCalling,
    InstructionFollowing,
}

impl Task {
    /// Metrics reported when a dataset does not name its own
    pub fn default_metrics(self) -> &'static [&'static str] {
        match self {
            Task::Classification => &["mcc", "macro_f1"],
            Task::MultipleChoice => &["mcc", "accuracy"],
            Task::NamedEntityRecognition => &["macro_f1", "exact_match"],
            Task::QuestionAnswering => &["exact_match"],
            Task::Summarization => &["rouge_l"],
            Task::ToolCalling | Task::InstructionFollowing => &["exact_match"],
        }
    }

    /// Generation budget used when a dataset does not set one
    pub fn default_max_generated_tokens(self) -> usize {
        match self {
            Task::Classification | Task::MultipleChoice => 5,
            Task::QuestionAnswering => 32,
            Task::NamedEntityRecognition => 128,
            Task::Summarization | Task::ToolCalling => 256,
            Task::InstructionFollowing => 512,
        }
    }

    /// Tasks whose predictions must be one of the dataset's labels
    pub fn requires_labels(self) -> bool {
        matches!(self, Task::Classification | Task::MultipleChoice)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Task::Classification => "classification",
            Task::NamedEntityRecognition => "named-entity-recognition",
            Task::QuestionAnswering => "question-answering",
            Task::Summarization => "summarization",
            Task::MultipleChoice => "multiple-choice",
            Task::ToolCalling => "tool-calling",
            Task::InstructionFollowing => "instruction-following",
        };
        write!(f, "{}", name)
    }
}

/// Configuration of a single benchmark dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    #[serde(default)]
    pub pretty_name: Option<String>,
    pub task: Task,
    pub languages: Vec<String>,
    /// JSON file with `train`, `val` and `test` splits
    #[serde(default)]
    pub source: PathBuf,
    /// Candidate labels for label tasks
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub max_generated_tokens: Option<usize>,
    /// Metric names overriding the task defaults
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
}

impl DatasetConfig {
    pub fn new(name: impl Into<String>, task: Task, languages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            pretty_name: None,
            task,
            languages,
            source: PathBuf::new(),
            labels: Vec::new(),
            max_generated_tokens: None,
            metrics: None,
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    pub fn display_name(&self) -> &str {
        self.pretty_name.as_deref().unwrap_or(&self.name)
    }

    pub fn max_generated_tokens(&self) -> usize {
        self.max_generated_tokens
            .unwrap_or_else(|| self.task.default_max_generated_tokens())
    }

    /// Metric names reported for this dataset
    pub fn metric_names(&self) -> Vec<&str> {
        match &self.metrics {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => self.task.default_metrics().to_vec(),
        }
    }

    /// Check the config is usable, naming the first problem found
    pub fn validate(&self) -> std::result::Result<(), String> {
        // The name becomes part of a cache file name
        validate_dataset_name(&self.name).map_err(|e| e.to_string())?;
        if self.languages.is_empty() {
            return Err(format!("dataset {} has no languages", self.name));
        }
        if self.task.requires_labels() && self.labels.is_empty() {
            return Err(format!(
                "dataset {} is a {} dataset but has no labels",
                self.name, self.task
            ));
        }
        if self.max_generated_tokens == Some(0) {
            return Err(format!("dataset {} has max_generated_tokens = 0", self.name));
        }
        if let Some(unknown) = self
            .metric_names()
            .into_iter()
            .find(|m| !METRIC_NAMES.contains(m))
        {
            return Err(format!(
                "dataset {} uses unknown metric {} (known: {})",
                self.name,
                unknown,
                METRIC_NAMES.join(", ")
            ));
        }
        Ok(())
    }
}

/// Dataset configs by name
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, DatasetConfig>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configs; duplicate names are rejected
    pub fn from_configs(configs: impl IntoIterator<Item = DatasetConfig>) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(config)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, config: DatasetConfig) -> Result<()> {
        if self.datasets.contains_key(&config.name) {
            return Err(BenchError::already_exists("dataset", &config.name));
        }
        self.datasets.insert(config.name.clone(), config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&DatasetConfig> {
        self.datasets
            .get(name)
            .ok_or_else(|| BenchError::not_found("dataset", name))
    }

    /// Datasets covering `language`, by name
    pub fn for_language<'a>(&'a self, language: &'a str) -> impl Iterator<Item = &'a DatasetConfig> {
        self.datasets
            .values()
            .filter(move |config| config.languages.iter().any(|l| l == language))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetConfig> {
        self.datasets.values()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CustomDatasetsFile {
    #[serde(default, rename = "dataset")]
    datasets: Vec<DatasetConfig>,
}

/// Load and validate dataset configs declared in a `.toml`, `.yaml` or `.yml` file.
///
/// Relative `source` paths are resolved against the file's directory.
pub fn load_custom_datasets(path: &Path) -> Result<Vec<DatasetConfig>> {
    let invalid = |reason: String| BenchError::InvalidDatasetsFile {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path)
        .map_err(|e| BenchError::io_operation("read custom datasets", path.display(), e))?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let file: CustomDatasetsFile = match extension {
        "toml" => toml::from_str(&content).map_err(|e| invalid(e.to_string()))?,
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?,
        other => {
            return Err(BenchError::unsupported(
                "custom datasets file extension",
                other,
                "toml, yaml, yml",
            ))
        }
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut configs = Vec::with_capacity(file.datasets.len());
    for mut config in file.datasets {
        config.validate().map_err(invalid)?;
        if config.source.as_os_str().is_empty() {
            return Err(invalid(format!("dataset {} has no source", config.name)));
        }
        if config.source.is_relative() {
            config.source = base_dir.join(&config.source);
        }
        configs.push(config);
    }

    tracing::debug!(path = %path.display(), datasets = configs.len(), "loaded custom datasets");
    Ok(configs)
}
