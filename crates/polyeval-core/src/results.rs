//! Append-only JSONL log of benchmark results.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::ScoreDict;
use crate::error::{BenchError, Result};
use crate::registry::Task;

/// One model evaluated on one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub dataset: String,
    pub task: Task,
    pub languages: Vec<String>,
    pub model: String,
    pub results: ScoreDict,
    /// Scores were computed on the validation split standing in for test
    pub validation_split: bool,
    /// Scores come from a smoke test on a single example. Records written
    /// before this field existed were full runs.
    #[serde(default)]
    pub smoke_test: bool,
    pub num_iterations: usize,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Whether this record answers the given model/dataset/split question.
    ///
    /// Smoke test records only answer smoke test runs and full records only
    /// answer full runs.
    pub fn matches(
        &self,
        model: &str,
        dataset: &str,
        validation_split: bool,
        smoke_test: bool,
    ) -> bool {
        self.model == model
            && self.dataset == dataset
            && self.validation_split == validation_split
            && self.smoke_test == smoke_test
    }
}

pub struct ResultsLog {
    path: PathBuf,
}

impl ResultsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line
    pub fn append(&self, result: &BenchmarkResult) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| BenchError::io_operation("create directory", parent.display(), e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BenchError::io_operation("open", self.path.display(), e))?;

        let line = serde_json::to_string(result)?;
        writeln!(file, "{}", line)
            .map_err(|e| BenchError::io_operation("append to", self.path.display(), e))?;
        Ok(())
    }

    /// Every readable record, oldest first. Malformed lines are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<BenchmarkResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| BenchError::io_operation("open", self.path.display(), e))?;
        let reader = BufReader::new(file);
        let mut results = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| BenchError::io_operation("read", self.path.display(), e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BenchmarkResult>(&line) {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping malformed result record"
                ),
            }
        }

        Ok(results)
    }

    /// True if a result for this model, dataset, split kind and run size is already logged
    pub fn contains(
        &self,
        model: &str,
        dataset: &str,
        validation_split: bool,
        smoke_test: bool,
    ) -> Result<bool> {
        Ok(self
            .load_all()?
            .iter()
            .any(|r| r.matches(model, dataset, validation_split, smoke_test)))
    }
}
