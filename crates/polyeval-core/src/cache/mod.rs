//! Persistent model output cache.
//!
//! One cache file exists per (model, dataset) pair, at
//! `<cache_dir>/model_cache/<model>/<dataset>-model-outputs.json`, with the
//! model id and dataset name escaped into single path components (see
//! [`model_cache_dir`]). The file is a
//! JSON object mapping cache keys (see [`key`]) to generated outputs:
//!
//! ```json
//! { "<key>": { "sequence": "positiv", "scores": [[["pos", -0.1]]], "max_generated_tokens": 5 } }
//! ```
//!
//! The cache is loaded once, extended in memory while a dataset is benchmarked,
//! and saved after every batch of new generations. There is no file locking:
//! two processes writing the same cache file lose each other's updates.

pub mod key;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::model::{GeneratedOutput, ModelInput, ModelInputs, TokenScores};

pub use key::{cache_key, canonical_form};

const CACHE_SUBDIR: &str = "model_cache";
const CACHE_FILE_SUFFIX: &str = "-model-outputs.json";

/// Generations at or above this budget are free text, so their token scores
/// are never used for label extraction and are not persisted.
pub const MAX_TOKENS_WITH_SCORES: usize = 8;

#[derive(Debug, Deserialize)]
struct StoredEntry {
    sequence: String,
    #[serde(default)]
    scores: Option<Vec<TokenScores>>,
    #[serde(default)]
    max_generated_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StoredEntryRef<'a> {
    sequence: &'a str,
    scores: &'a Option<Vec<TokenScores>>,
    max_generated_tokens: usize,
}

/// Cache of model outputs for one (model, dataset) pair.
#[derive(Debug)]
pub struct ModelCache {
    path: PathBuf,
    max_generated_tokens: usize,
    hash_inputs: bool,
    entries: BTreeMap<String, GeneratedOutput>,
}

impl ModelCache {
    /// Create an empty cache for `model_id` on the dataset named `cache_name`.
    ///
    /// Nothing is read from disk until [`ModelCache::load`] is called.
    pub fn new(
        cache_dir: &Path,
        model_id: &str,
        cache_name: &str,
        max_generated_tokens: usize,
        hash_inputs: bool,
    ) -> Self {
        Self {
            path: cache_path(cache_dir, model_id, cache_name),
            max_generated_tokens,
            hash_inputs,
            entries: BTreeMap::new(),
        }
    }

    /// Path of the backing cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_generated_tokens(&self) -> usize {
        self.max_generated_tokens
    }

    pub fn hash_inputs(&self) -> bool {
        self.hash_inputs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read the backing file into memory, replacing the in-memory entries.
    ///
    /// A missing file yields an empty cache. An unreadable or corrupted file
    /// is logged and also yields an empty cache; loading never fails.
    /// Entries generated under a different token budget are dropped.
    pub fn load(&mut self) {
        self.entries.clear();

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no model cache file, starting empty");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read model cache, starting with an empty cache"
                );
                return;
            }
        };

        let stored: BTreeMap<String, StoredEntry> = match serde_json::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "model cache is corrupted, starting with an empty cache"
                );
                return;
            }
        };

        let total = stored.len();
        for (key, entry) in stored {
            if entry
                .max_generated_tokens
                .is_some_and(|budget| budget != self.max_generated_tokens)
            {
                continue;
            }
            self.entries.insert(
                key,
                GeneratedOutput {
                    sequence: entry.sequence,
                    scores: entry.scores,
                },
            );
        }

        let stale = total - self.entries.len();
        if stale > 0 {
            tracing::info!(
                stale,
                max_generated_tokens = self.max_generated_tokens,
                "dropped model cache entries generated under a different token budget"
            );
        }
        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "loaded model cache");
    }

    /// Write every entry to the backing file.
    ///
    /// The file is written next to its final location and renamed into place,
    /// so a crash mid-write never leaves a truncated cache behind.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BenchError::io_operation("create", parent.display(), e))?;
        }

        let stored: BTreeMap<&str, StoredEntryRef<'_>> = self
            .entries
            .iter()
            .map(|(key, output)| {
                (
                    key.as_str(),
                    StoredEntryRef {
                        sequence: &output.sequence,
                        scores: &output.scores,
                        max_generated_tokens: self.max_generated_tokens,
                    },
                )
            })
            .collect();
        let content = serde_json::to_string_pretty(&stored)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)
            .map_err(|e| BenchError::io_operation("write", temp_path.display(), e))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| BenchError::io_operation("replace", self.path.display(), e))?;

        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "saved model cache");
        Ok(())
    }

    /// Delete the backing file. Missing files are not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "removed model cache");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BenchError::io_operation("remove", self.path.display(), e)),
        }
    }

    /// Cache key for `input` under this cache's hashing setting
    pub fn key_for(&self, input: &ModelInput) -> String {
        cache_key(input, self.hash_inputs)
    }

    pub fn contains(&self, input: &ModelInput) -> bool {
        self.contains_key(&self.key_for(input))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Stored output for `input`, if any
    pub fn get(&self, input: &ModelInput) -> Option<&GeneratedOutput> {
        self.get_by_key(&self.key_for(input))
    }

    pub fn get_by_key(&self, key: &str) -> Option<&GeneratedOutput> {
        self.entries.get(key)
    }

    /// Insert or overwrite the output stored for `input`
    pub fn insert(&mut self, input: &ModelInput, output: GeneratedOutput) {
        let key = self.key_for(input);
        self.entries.insert(key, output);
    }

    /// Store a batch of outputs, pairing inputs and outputs by position.
    ///
    /// Batches of different lengths are rejected before anything is stored.
    /// Token scores are kept only for short, label-style generations.
    pub fn add_to_cache(
        &mut self,
        model_inputs: &ModelInputs,
        model_output: &[GeneratedOutput],
    ) -> Result<()> {
        if model_inputs.len() != model_output.len() {
            return Err(BenchError::CacheLengthMismatch {
                inputs: model_inputs.len(),
                outputs: model_output.len(),
            });
        }

        let keep_scores = self.max_generated_tokens < MAX_TOKENS_WITH_SCORES;
        for (input, output) in model_inputs.to_inputs().iter().zip(model_output) {
            let mut output = output.clone();
            if !keep_scores {
                output.scores = None;
            }
            self.insert(input, output);
        }
        Ok(())
    }
}

/// Directory holding every cache file of one model.
///
/// The model id becomes a single path component: `%` and the path
/// separators `/`, `\` and `:` are percent-escaped, so distinct ids always
/// get distinct directories (`org/model` is `org%2Fmodel`, while `org--model`
/// stays as is). Ids that are empty or made only of dots are escaped too and
/// never resolve to the cache root or a parent directory.
pub fn model_cache_dir(cache_dir: &Path, model_id: &str) -> PathBuf {
    cache_dir.join(CACHE_SUBDIR).join(path_component(model_id))
}

/// Location of the cache file for a (model, dataset) pair
pub fn cache_path(cache_dir: &Path, model_id: &str, cache_name: &str) -> PathBuf {
    model_cache_dir(cache_dir, model_id)
        .join(format!("{}{}", path_component(cache_name), CACHE_FILE_SUFFIX))
}

fn path_component(name: &str) -> String {
    if name.is_empty() {
        return "%00".to_string();
    }
    if name.chars().all(|c| c == '.') {
        return name.replace('.', "%2E");
    }
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            ':' => escaped.push_str("%3A"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Reject model ids that cannot name a model.
///
/// Ids may contain `/` (`org/model`) but must not look like an absolute path
/// or contain a `.` or `..` segment.
pub fn validate_model_id(model_id: &str) -> Result<()> {
    let reason = if model_id.trim().is_empty() {
        Some("model id is empty")
    } else if model_id.starts_with(['/', '\\']) {
        Some("model id starts with a path separator")
    } else if model_id.chars().any(char::is_control) {
        Some("model id contains control characters")
    } else if model_id
        .split(['/', '\\'])
        .any(|segment| segment == "." || segment == "..")
    {
        Some("model id contains a '.' or '..' segment")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(BenchError::invalid_value(
            "model id",
            format!("{:?} ({})", model_id, reason),
        )),
        None => Ok(()),
    }
}

/// Reject dataset names that are not a plain file name stem
pub fn validate_dataset_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("dataset name is empty")
    } else if name.contains(['/', '\\']) {
        Some("dataset name contains a path separator")
    } else if name == "." || name == ".." {
        Some("dataset name is a relative directory")
    } else if name.chars().any(char::is_control) {
        Some("dataset name contains control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(BenchError::invalid_value(
            "dataset name",
            format!("{:?} ({})", name, reason),
        )),
        None => Ok(()),
    }
}
