//! Benchmark datasets: typed examples split into train, val and test.
//!
//! Datasets are read from a JSON file shaped like
//!
//! ```json
//! {
//!   "train": [{"input": {"text": "Sikke en dejlig dag"}, "label": "positive"}],
//!   "val":   [...],
//!   "test":  [...]
//! }
//! ```
//!
//! A file missing any of the three splits is rejected outright.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bail_dataset;
use crate::error::{BenchError, Result};
use crate::model::{ModelInput, ModelInputs};

/// Names of the splits every dataset must provide
pub const SPLITS: [&str; 3] = ["train", "val", "test"];

/// A single labelled example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub input: ModelInput,
    /// Canonical reference: the gold label or answer
    pub label: String,
    /// Further acceptable references (e.g. alternative QA answers)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

impl Example {
    pub fn new(input: impl Into<ModelInput>, label: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            label: label.into(),
            alternatives: Vec::new(),
        }
    }

    /// The label followed by every alternative
    pub fn references(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.label.as_str()).chain(self.alternatives.iter().map(String::as_str))
    }
}

/// An ordered collection of examples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Split(pub Vec<Example>);

impl Split {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn examples(&self) -> &[Example] {
        &self.0
    }

    /// New split holding the examples at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Split {
        Split(indices.iter().map(|&i| self.0[i].clone()).collect())
    }

    /// Drop examples with nothing for the model to read
    pub fn filter_empty(self) -> Split {
        Split(self.0.into_iter().filter(|e| !e.input.is_blank()).collect())
    }

    /// Model inputs of this split as one batch
    pub fn inputs(&self, dataset: &str) -> Result<ModelInputs> {
        let inputs = self.0.iter().map(|e| e.input.clone()).collect();
        ModelInputs::from_inputs(inputs)
            .map_err(|_| BenchError::dataset_shape(dataset, "split mixes texts and conversations"))
    }
}

impl From<Vec<Example>> for Split {
    fn from(examples: Vec<Example>) -> Self {
        Split(examples)
    }
}

/// The three splits of one dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub train: Split,
    pub val: Split,
    pub test: Split,
}

impl Dataset {
    /// Load a dataset from a JSON file with `train`, `val` and `test` arrays.
    pub fn from_json_file(path: &Path, name: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BenchError::io_operation("read dataset", path.display(), e))?;
        Self::from_json_str(&content, name)
    }

    /// Parse a dataset, failing immediately if a split is missing.
    pub fn from_json_str(content: &str, name: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let Some(object) = value.as_object() else {
            bail_dataset!(name, "expected a JSON object with train, val and test splits");
        };

        let missing: Vec<&str> = SPLITS
            .iter()
            .copied()
            .filter(|split| !object.contains_key(*split))
            .collect();
        if !missing.is_empty() {
            bail_dataset!(name, format!("missing split(s): {}", missing.join(", ")));
        }

        serde_json::from_value(value).map_err(|e| BenchError::dataset_shape(name, e))
    }

    /// Remove examples with empty inputs from every split
    pub fn filter_empty(self) -> Self {
        Self {
            train: self.train.filter_empty(),
            val: self.val.filter_empty(),
            test: self.test.filter_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "train": [{"input": {"text": "godt"}, "label": "positive"}],
        "val": [{"input": {"text": ""}, "label": "neutral"},
                {"input": {"text": "skidt"}, "label": "negative"}],
        "test": [{"input": {"messages": [{"role": "user", "content": "Hvem?"}]},
                  "label": "Ida", "alternatives": ["ida"]}]
    }"#;

    #[test]
    fn test_parse_all_splits() {
        let dataset = Dataset::from_json_str(SAMPLE, "sample").unwrap();
        assert_eq!(dataset.train.len(), 1);
        assert_eq!(dataset.val.len(), 2);
        assert_eq!(dataset.test.examples()[0].alternatives, vec!["ida"]);
        let refs: Vec<_> = dataset.test.examples()[0].references().collect();
        assert_eq!(refs, vec!["Ida", "ida"]);
    }

    #[test]
    fn test_missing_split_is_fatal() {
        let err = Dataset::from_json_str(r#"{"train": [], "test": []}"#, "broken").unwrap_err();
        match err {
            BenchError::DatasetShape { dataset, reason } => {
                assert_eq!(dataset, "broken");
                assert!(reason.contains("val"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(matches!(
            Dataset::from_json_str("[]", "list"),
            Err(BenchError::DatasetShape { .. })
        ));
    }

    #[test]
    fn test_filter_empty_inputs() {
        let dataset = Dataset::from_json_str(SAMPLE, "sample").unwrap().filter_empty();
        assert_eq!(dataset.val.len(), 1);
        assert_eq!(dataset.val.examples()[0].label, "negative");
    }

    #[test]
    fn test_mixed_split_inputs_rejected() {
        let split = Split(vec![
            Example::new("text", "a"),
            Example::new(
                ModelInput::Messages(vec![crate::model::Turn::new("user", "hi")]),
                "b",
            ),
        ]);
        assert!(matches!(
            split.inputs("mixed"),
            Err(BenchError::DatasetShape { .. })
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.json");
        fs::write(&path, SAMPLE).unwrap();
        let dataset = Dataset::from_json_file(&path, "sample").unwrap();
        assert_eq!(dataset.test.len(), 1);
    }
}
