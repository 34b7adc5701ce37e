//! Per-iteration scoring.
//!
//! One iteration runs the model over a resampled test split (through the
//! cache) and reduces the predictions with every metric of the dataset.
//! Metrics that run out of resources are retried after downgrading their
//! compute footprint, up to a fixed attempt budget.

use thiserror::Error;

use crate::aggregate::{score_key, RawScore};
use crate::cache::ModelCache;
use crate::config::BenchmarkConfig;
use crate::dataset::{Example, Split};
use crate::error::{BenchError, Result};
use crate::inference::generate_with_cache;
use crate::labels::extract_label;
use crate::logging::CacheMetrics;
use crate::model::Model;
use crate::registry::DatasetConfig;

/// Structured failure signal from a metric computation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Out of memory or similar; may succeed with a smaller footprint
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    /// Anything else; retrying will not help
    #[error("{0}")]
    Failed(String),
}

/// Everything a metric may look at
#[derive(Debug, Clone, Copy)]
pub struct MetricInput<'a> {
    pub predictions: &'a [String],
    pub references: &'a [Example],
    pub dataset_config: &'a DatasetConfig,
    pub benchmark_config: &'a BenchmarkConfig,
}

/// Reduces predictions and references to a single score.
pub trait Metric {
    /// Identifier used in score keys (`test_<name>`)
    fn name(&self) -> &str;

    /// Human-readable name for logs and reports
    fn pretty_name(&self) -> &str {
        self.name()
    }

    /// Compute the score. `Ok(None)` means the metric does not apply to this
    /// run and is left out of the raw scores.
    fn compute(&self, input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError>;

    /// Shrink the compute footprint after a resource failure.
    ///
    /// Returns false once there is nothing left to give up.
    fn downgrade(&mut self) -> bool {
        false
    }
}

#[derive(Debug)]
enum RetryState {
    Attempting { attempt: u32 },
    Downgraded { attempt: u32 },
    Succeeded(Option<f64>),
    Failed { attempts: u32, reason: String },
}

/// Compute `metric`, downgrading and retrying on resource exhaustion.
///
/// Fails with [`BenchError::InvalidBenchmark`] when the metric fails for any
/// other reason, when no downgrade is left, or after `max_attempts` attempts.
pub fn compute_with_retry(
    metric: &mut dyn Metric,
    input: &MetricInput<'_>,
    max_attempts: u32,
) -> Result<Option<f64>> {
    let mut state = RetryState::Attempting { attempt: 1 };
    loop {
        state = match state {
            RetryState::Attempting { attempt } => match metric.compute(input) {
                Ok(score) => RetryState::Succeeded(score),
                Err(MetricError::ResourceExhausted(reason)) => {
                    if attempt < max_attempts && metric.downgrade() {
                        tracing::debug!(
                            metric = metric.name(),
                            attempt,
                            reason = %reason,
                            "metric ran out of resources, retrying with a smaller footprint"
                        );
                        RetryState::Downgraded { attempt }
                    } else {
                        RetryState::Failed {
                            attempts: attempt,
                            reason,
                        }
                    }
                }
                Err(MetricError::Failed(reason)) => RetryState::Failed {
                    attempts: attempt,
                    reason,
                },
            },
            RetryState::Downgraded { attempt } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            RetryState::Succeeded(score) => return Ok(score),
            RetryState::Failed { attempts, reason } => {
                return Err(BenchError::InvalidBenchmark {
                    metric: metric.name().to_string(),
                    attempts,
                    reason,
                })
            }
        };
    }
}

/// Shared, read-only context of the iterations of one dataset
#[derive(Debug, Clone, Copy)]
pub struct IterationContext<'a> {
    pub dataset_config: &'a DatasetConfig,
    pub benchmark_config: &'a BenchmarkConfig,
    pub cache_metrics: &'a CacheMetrics,
}

/// Score one resampled test split.
///
/// Outputs come from the cache where possible; label tasks map each output
/// onto the dataset's labels before the metrics see it.
pub fn score_iteration<M: Model + ?Sized>(
    model: &mut M,
    cache: &mut ModelCache,
    test: &Split,
    metrics: &mut [Box<dyn Metric>],
    ctx: &IterationContext<'_>,
) -> Result<RawScore> {
    let inputs = test.inputs(&ctx.dataset_config.name)?;
    let outputs = generate_with_cache(model, cache, &inputs, ctx.cache_metrics)?;

    let labels = &ctx.dataset_config.labels;
    let predictions: Vec<String> = outputs
        .iter()
        .map(|output| extract_label(output, labels))
        .collect();

    let input = MetricInput {
        predictions: &predictions,
        references: test.examples(),
        dataset_config: ctx.dataset_config,
        benchmark_config: ctx.benchmark_config,
    };

    let mut raw = RawScore::new();
    for metric in metrics.iter_mut() {
        let max_attempts = ctx.benchmark_config.metric_max_attempts;
        if let Some(score) = compute_with_retry(metric.as_mut(), &input, max_attempts)? {
            raw.insert(score_key(metric.name()), score);
        } else {
            tracing::debug!(metric = metric.name(), "metric skipped for this run");
        }
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeneratedOutput, ModelInputs};
    use crate::registry::Task;
    use std::cell::Cell;
    use tempfile::tempdir;

    /// Fails with resource exhaustion until it has been downgraded `needed` times
    struct HungryMetric {
        downgrades_left: u32,
        downgrades_done: u32,
        needed: u32,
        calls: Cell<u32>,
    }

    impl HungryMetric {
        fn new(needed: u32, available: u32) -> Self {
            Self {
                downgrades_left: available,
                downgrades_done: 0,
                needed,
                calls: Cell::new(0),
            }
        }
    }

    impl Metric for HungryMetric {
        fn name(&self) -> &str {
            "hungry"
        }

        fn compute(&self, _input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError> {
            self.calls.set(self.calls.get() + 1);
            if self.downgrades_done >= self.needed {
                Ok(Some(1.0))
            } else {
                Err(MetricError::ResourceExhausted("out of memory".into()))
            }
        }

        fn downgrade(&mut self) -> bool {
            if self.downgrades_left == 0 {
                return false;
            }
            self.downgrades_left -= 1;
            self.downgrades_done += 1;
            true
        }
    }

    struct BrokenMetric;

    impl Metric for BrokenMetric {
        fn name(&self) -> &str {
            "broken"
        }

        fn compute(&self, _input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError> {
            Err(MetricError::Failed("division by zero".into()))
        }
    }

    struct SkippedMetric;

    impl Metric for SkippedMetric {
        fn name(&self) -> &str {
            "skipped"
        }

        fn compute(&self, _input: &MetricInput<'_>) -> std::result::Result<Option<f64>, MetricError> {
            Ok(None)
        }
    }

    struct EchoModel;

    impl Model for EchoModel {
        fn model_id(&self) -> &str {
            "echo"
        }

        fn generate(&mut self, inputs: &ModelInputs) -> Result<Vec<GeneratedOutput>> {
            match inputs {
                ModelInputs::Texts(texts) => Ok(texts.iter().map(GeneratedOutput::new).collect()),
                ModelInputs::Messages(_) => Err(BenchError::Other("texts only".into())),
            }
        }
    }

    fn dataset_config() -> DatasetConfig {
        DatasetConfig::new("toy", Task::Classification, vec!["da".into()])
            .with_labels(vec!["positive".into(), "negative".into()])
    }

    fn with_input<T>(f: impl FnOnce(&MetricInput<'_>) -> T) -> T {
        let dataset_config = dataset_config();
        let benchmark_config = BenchmarkConfig::default();
        let input = MetricInput {
            predictions: &[],
            references: &[],
            dataset_config: &dataset_config,
            benchmark_config: &benchmark_config,
        };
        f(&input)
    }

    #[test]
    fn test_retry_succeeds_after_downgrades() {
        let mut metric = HungryMetric::new(2, 10);
        let score = with_input(|input| compute_with_retry(&mut metric, input, 5)).unwrap();
        assert_eq!(score, Some(1.0));
        assert_eq!(metric.calls.get(), 3);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let mut metric = HungryMetric::new(10, 10);
        let err = with_input(|input| compute_with_retry(&mut metric, input, 5)).unwrap_err();
        match err {
            BenchError::InvalidBenchmark {
                metric: name,
                attempts,
                ..
            } => {
                assert_eq!(name, "hungry");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(metric.calls.get(), 5);
    }

    #[test]
    fn test_retry_stops_when_no_downgrade_left() {
        let mut metric = HungryMetric::new(3, 1);
        let err = with_input(|input| compute_with_retry(&mut metric, input, 5)).unwrap_err();
        assert!(matches!(err, BenchError::InvalidBenchmark { attempts: 2, .. }));
    }

    #[test]
    fn test_non_resource_failure_is_terminal() {
        let err = with_input(|input| compute_with_retry(&mut BrokenMetric, input, 5)).unwrap_err();
        assert!(matches!(err, BenchError::InvalidBenchmark { attempts: 1, .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_score_iteration_extracts_labels_and_skips_none() {
        let dir = tempdir().unwrap();
        let mut cache = ModelCache::new(dir.path(), "echo", "toy", 5, true);
        let test = Split(vec![
            Example::new("Positive!", "positive"),
            Example::new("negativ", "negative"),
            Example::new("negative", "positive"),
        ]);
        let dataset_config = dataset_config();
        let benchmark_config = BenchmarkConfig::default();
        let cache_metrics = CacheMetrics::new();
        let ctx = IterationContext {
            dataset_config: &dataset_config,
            benchmark_config: &benchmark_config,
            cache_metrics: &cache_metrics,
        };
        let mut metrics: Vec<Box<dyn Metric>> = vec![
            Box::new(crate::metrics::Accuracy),
            Box::new(SkippedMetric),
        ];

        let raw = score_iteration(&mut EchoModel, &mut cache, &test, &mut metrics, &ctx).unwrap();
        assert_eq!(raw.len(), 1);
        assert!((raw["test_accuracy"] - 2.0 / 3.0).abs() < 1e-12);
    }
}
