//! Model inputs, generated outputs and the model collaborator trait.
//!
//! The core never loads or talks to a model itself. Anything that can turn a
//! batch of prepared inputs into one generated sequence per input implements
//! [`Model`], and the cache-partitioned driver in [`crate::inference`] decides
//! which inputs actually reach it.

pub mod command;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

pub use command::CommandModel;

/// One turn of a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

impl Turn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// A single prepared model input: either a plain prompt or a conversation.
///
/// Serialized externally tagged, i.e. `{"text": "..."}` or
/// `{"messages": [{"role": "user", "content": "..."}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelInput {
    Text(String),
    Messages(Vec<Turn>),
}

impl ModelInput {
    /// True when there is nothing for the model to read
    pub fn is_blank(&self) -> bool {
        match self {
            ModelInput::Text(text) => text.trim().is_empty(),
            ModelInput::Messages(turns) => turns.iter().all(|t| t.content.trim().is_empty()),
        }
    }
}

impl From<&str> for ModelInput {
    fn from(text: &str) -> Self {
        ModelInput::Text(text.to_string())
    }
}

/// A homogeneous batch of model inputs.
///
/// Serialized as `{"texts": [...]}` or `{"messages": [[...], ...]}`, the shape
/// batch-generation backends receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelInputs {
    Texts(Vec<String>),
    Messages(Vec<Vec<Turn>>),
}

impl ModelInputs {
    /// Build a batch from individual inputs. Mixing texts and conversations is rejected.
    pub fn from_inputs(inputs: Vec<ModelInput>) -> Result<Self> {
        let wants_messages = matches!(inputs.first(), Some(ModelInput::Messages(_)));
        if wants_messages {
            let mut conversations = Vec::with_capacity(inputs.len());
            for input in inputs {
                match input {
                    ModelInput::Messages(turns) => conversations.push(turns),
                    ModelInput::Text(_) => {
                        return Err(BenchError::invalid_value(
                            "model input batch",
                            "mixes texts and conversations",
                        ))
                    }
                }
            }
            Ok(ModelInputs::Messages(conversations))
        } else {
            let mut texts = Vec::with_capacity(inputs.len());
            for input in inputs {
                match input {
                    ModelInput::Text(text) => texts.push(text),
                    ModelInput::Messages(_) => {
                        return Err(BenchError::invalid_value(
                            "model input batch",
                            "mixes texts and conversations",
                        ))
                    }
                }
            }
            Ok(ModelInputs::Texts(texts))
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ModelInputs::Texts(texts) => texts.len(),
            ModelInputs::Messages(conversations) => conversations.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the input at `index` as an owned [`ModelInput`]
    pub fn get(&self, index: usize) -> Option<ModelInput> {
        match self {
            ModelInputs::Texts(texts) => texts.get(index).cloned().map(ModelInput::Text),
            ModelInputs::Messages(conversations) => {
                conversations.get(index).cloned().map(ModelInput::Messages)
            }
        }
    }

    /// All inputs of the batch, in order
    pub fn to_inputs(&self) -> Vec<ModelInput> {
        match self {
            ModelInputs::Texts(texts) => texts.iter().cloned().map(ModelInput::Text).collect(),
            ModelInputs::Messages(conversations) => conversations
                .iter()
                .cloned()
                .map(ModelInput::Messages)
                .collect(),
        }
    }

    /// Sub-batch containing the given indices, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        match self {
            ModelInputs::Texts(texts) => {
                ModelInputs::Texts(indices.iter().map(|&i| texts[i].clone()).collect())
            }
            ModelInputs::Messages(conversations) => ModelInputs::Messages(
                indices.iter().map(|&i| conversations[i].clone()).collect(),
            ),
        }
    }
}

/// Top alternatives at one generated position: (token, log-probability)
pub type TokenScores = Vec<(String, f64)>;

/// A single generated sequence, optionally with per-position token scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedOutput {
    pub sequence: String,
    #[serde(default)]
    pub scores: Option<Vec<TokenScores>>,
}

impl GeneratedOutput {
    pub fn new(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            scores: None,
        }
    }

    pub fn with_scores(mut self, scores: Vec<TokenScores>) -> Self {
        self.scores = Some(scores);
        self
    }
}

/// A model capable of producing one output per input for a batch.
pub trait Model {
    /// Identifier used to scope the model output cache
    fn model_id(&self) -> &str;

    /// Generate one output per input, in input order
    fn generate(&mut self, inputs: &ModelInputs) -> Result<Vec<GeneratedOutput>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_input_serializes_externally_tagged() {
        let text = serde_json::to_value(ModelInput::from("hej")).unwrap();
        assert_eq!(text, serde_json::json!({"text": "hej"}));

        let messages = ModelInput::Messages(vec![Turn::new("user", "hej")]);
        let value = serde_json::to_value(&messages).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"messages": [{"role": "user", "content": "hej"}]})
        );
    }

    #[test]
    fn test_batch_serializes_as_texts_or_messages() {
        let batch = ModelInputs::Texts(vec!["a".into(), "b".into()]);
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value, serde_json::json!({"texts": ["a", "b"]}));
    }

    #[test]
    fn test_from_inputs_rejects_mixed_batch() {
        let inputs = vec![
            ModelInput::from("a"),
            ModelInput::Messages(vec![Turn::new("user", "b")]),
        ];
        assert!(ModelInputs::from_inputs(inputs).is_err());
    }

    #[test]
    fn test_select_preserves_requested_order() {
        let batch = ModelInputs::Texts(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(
            batch.select(&[2, 0]),
            ModelInputs::Texts(vec!["c".into(), "a".into()])
        );
    }

    #[test]
    fn test_blank_inputs() {
        assert!(ModelInput::from("   ").is_blank());
        assert!(ModelInput::Messages(vec![Turn::new("user", "")]).is_blank());
        assert!(!ModelInput::Messages(vec![Turn::new("user", "x")]).is_blank());
    }

    #[test]
    fn test_generated_output_scores_default_to_none() {
        let output: GeneratedOutput = serde_json::from_str(r#"{"sequence": "ja"}"#).unwrap();
        assert_eq!(output, GeneratedOutput::new("ja"));
    }
}
