//! Built-in reference metrics.
//!
//! Heavier, model-based metrics live with the surrounding tooling; these
//! cover label tasks (accuracy, macro-F1, MCC) and free-text answers
//! (exact match, ROUGE-L) without external dependencies.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BenchError, Result};
use crate::scoring::{Metric, MetricError, MetricInput};

/// Names accepted by [`metric_by_name`]
pub const METRIC_NAMES: [&str; 5] = ["accuracy", "macro_f1", "mcc", "exact_match", "rouge_l"];

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{P}\p{S}]").expect("valid punctuation regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Lowercase, strip punctuation and collapse whitespace
pub fn normalize_answer(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Look up a built-in metric by name
pub fn metric_by_name(name: &str) -> Result<Box<dyn Metric>> {
    match name {
        "accuracy" => Ok(Box::new(Accuracy)),
        "macro_f1" => Ok(Box::new(MacroF1)),
        "mcc" => Ok(Box::new(Mcc)),
        "exact_match" => Ok(Box::new(ExactMatch)),
        "rouge_l" => Ok(Box::new(RougeL)),
        other => Err(BenchError::unsupported(
            "metric",
            other,
            METRIC_NAMES.join(", "),
        )),
    }
}

/// Predicted and gold labels, normalized. `None` when there is nothing to score.
fn label_pairs(input: &MetricInput<'_>) -> std::result::Result<Option<Vec<(String, String)>>, MetricError> {
    if input.predictions.len() != input.references.len() {
        return Err(MetricError::Failed(format!(
            "{} predictions for {} references",
            input.predictions.len(),
            input.references.len()
        )));
    }
    if input.predictions.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        input
            .predictions
            .iter()
            .zip(input.references)
            .map(|(pred, example)| (normalize_answer(pred), normalize_answer(&example.label)))
            .collect(),
    ))
}

/// Fraction of predictions equal to the gold label
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Metric for Accuracy {
    fn name(&self) -> &str {
        "accuracy"
    }

    fn pretty_name(&self) -> &str {
        "Accuracy"
    }

    fn compute(&self, input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError> {
        let Some(pairs) = label_pairs(input)? else {
            return Ok(None);
        };
        let correct = pairs.iter().filter(|(pred, gold)| pred == gold).count();
        Ok(Some(correct as f64 / pairs.len() as f64))
    }
}

/// Unweighted mean of per-class F1 over every class seen in gold or predictions
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroF1;

impl Metric for MacroF1 {
    fn name(&self) -> &str {
        "macro_f1"
    }

    fn pretty_name(&self) -> &str {
        "Macro-average F1-score"
    }

    fn compute(&self, input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError> {
        let Some(pairs) = label_pairs(input)? else {
            return Ok(None);
        };
        let classes: BTreeSet<&str> = pairs
            .iter()
            .flat_map(|(pred, gold)| [pred.as_str(), gold.as_str()])
            .collect();

        let total: f64 = classes
            .iter()
            .map(|class| {
                let tp = pairs.iter().filter(|(p, g)| p == class && g == class).count();
                let fp = pairs.iter().filter(|(p, g)| p == class && g != class).count();
                let fn_ = pairs.iter().filter(|(p, g)| p != class && g == class).count();
                let denominator = 2 * tp + fp + fn_;
                if denominator == 0 {
                    0.0
                } else {
                    2.0 * tp as f64 / denominator as f64
                }
            })
            .sum();
        Ok(Some(total / classes.len() as f64))
    }
}

/// Multiclass Matthews correlation coefficient
#[derive(Debug, Clone, Copy, Default)]
pub struct Mcc;

impl Metric for Mcc {
    fn name(&self) -> &str {
        "mcc"
    }

    fn pretty_name(&self) -> &str {
        "Matthew's Correlation Coefficient"
    }

    fn compute(&self, input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError> {
        let Some(pairs) = label_pairs(input)? else {
            return Ok(None);
        };

        let mut true_counts: BTreeMap<&str, f64> = BTreeMap::new();
        let mut pred_counts: BTreeMap<&str, f64> = BTreeMap::new();
        let mut correct = 0.0;
        for (pred, gold) in &pairs {
            *true_counts.entry(gold.as_str()).or_default() += 1.0;
            *pred_counts.entry(pred.as_str()).or_default() += 1.0;
            if pred == gold {
                correct += 1.0;
            }
        }

        let samples = pairs.len() as f64;
        let pred_dot_true: f64 = pred_counts
            .iter()
            .map(|(class, p)| p * true_counts.get(class).copied().unwrap_or(0.0))
            .sum();
        let pred_sq: f64 = pred_counts.values().map(|p| p * p).sum();
        let true_sq: f64 = true_counts.values().map(|t| t * t).sum();

        let numerator = correct * samples - pred_dot_true;
        let denominator = ((samples * samples - pred_sq) * (samples * samples - true_sq)).sqrt();
        if denominator == 0.0 {
            Ok(Some(0.0))
        } else {
            Ok(Some(numerator / denominator))
        }
    }
}

/// Fraction of predictions matching the label or any alternative after normalization
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl Metric for ExactMatch {
    fn name(&self) -> &str {
        "exact_match"
    }

    fn pretty_name(&self) -> &str {
        "Exact Match"
    }

    fn compute(&self, input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError> {
        if label_pairs(input)?.is_none() {
            return Ok(None);
        }
        let matches = input
            .predictions
            .iter()
            .zip(input.references)
            .filter(|(pred, example)| {
                let pred = normalize_answer(pred);
                example.references().any(|r| normalize_answer(r) == pred)
            })
            .count();
        Ok(Some(matches as f64 / input.predictions.len() as f64))
    }
}

/// Mean ROUGE-L F-measure against the best-matching reference
#[derive(Debug, Clone, Copy, Default)]
pub struct RougeL;

impl RougeL {
    fn f_measure(prediction: &str, reference: &str) -> f64 {
        let pred = normalize_answer(prediction);
        let refr = normalize_answer(reference);
        let pred_tokens: Vec<&str> = pred.split_whitespace().collect();
        let ref_tokens: Vec<&str> = refr.split_whitespace().collect();
        let lcs = lcs_len(&pred_tokens, &ref_tokens) as f64;
        if lcs == 0.0 {
            return 0.0;
        }
        let precision = lcs / pred_tokens.len() as f64;
        let recall = lcs / ref_tokens.len() as f64;
        2.0 * precision * recall / (precision + recall)
    }
}

impl Metric for RougeL {
    fn name(&self) -> &str {
        "rouge_l"
    }

    fn pretty_name(&self) -> &str {
        "ROUGE-L"
    }

    fn compute(&self, input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError> {
        if label_pairs(input)?.is_none() {
            return Ok(None);
        }
        let total: f64 = input
            .predictions
            .iter()
            .zip(input.references)
            .map(|(pred, example)| {
                example
                    .references()
                    .map(|r| Self::f_measure(pred, r))
                    .fold(0.0, f64::max)
            })
            .sum();
        Ok(Some(total / input.predictions.len() as f64))
    }
}

/// Length of the longest common subsequence of two token lists
fn lcs_len(a: &[&str], b: &[&str]) -> usize {
    let mut previous = vec![0; b.len() + 1];
    for token_a in a {
        let mut current = vec![0; b.len() + 1];
        for (j, token_b) in b.iter().enumerate() {
            current[j + 1] = if token_a == token_b {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        previous = current;
    }
    previous[b.len()]
}
