//! Benchmark orchestration: dataset to score dict, and datasets to result log.
//!
//! For each dataset the run is: load and prepare the splits, draw every
//! bootstrap resample up front, open the model's output cache for the dataset,
//! score each resample, then aggregate. Because the cache is keyed by input,
//! rows that recur across resamples only reach the model once.

use chrono::Utc;

use crate::aggregate::{format_score, RawScore, ScoreDict};
use crate::bootstrap::{bootstrap_datasets, prepare_dataset};
use crate::cache::{validate_dataset_name, validate_model_id, ModelCache};
use crate::config::BenchmarkConfig;
use crate::dataset::Dataset;
use crate::error::{BenchError, Result};
use crate::log_cache_metrics;
use crate::logging::CacheMetrics;
use crate::metrics::metric_by_name;
use crate::model::Model;
use crate::registry::DatasetConfig;
use crate::results::{BenchmarkResult, ResultsLog};
use crate::scoring::{score_iteration, IterationContext, Metric};

/// Runs models over datasets and records the results
pub struct Benchmarker {
    config: BenchmarkConfig,
    results: ResultsLog,
}

impl Benchmarker {
    pub fn new(config: BenchmarkConfig) -> Self {
        let results = ResultsLog::new(config.results_path.clone());
        Self { config, results }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn results_log(&self) -> &ResultsLog {
        &self.results
    }

    /// Score `model` on the dataset described by `dataset_config`, reading its source file.
    pub fn benchmark_dataset<M: Model + ?Sized>(
        &self,
        model: &mut M,
        dataset_config: &DatasetConfig,
    ) -> Result<ScoreDict> {
        let dataset = Dataset::from_json_file(&dataset_config.source, &dataset_config.name)?;
        self.benchmark_loaded(model, dataset_config, dataset)
    }

    /// Score `model` on an already loaded dataset.
    pub fn benchmark_loaded<M: Model + ?Sized>(
        &self,
        model: &mut M,
        dataset_config: &DatasetConfig,
        dataset: Dataset,
    ) -> Result<ScoreDict> {
        self.config.validate()?;
        validate_model_id(model.model_id())?;
        let name = dataset_config.name.as_str();
        validate_dataset_name(name)?;

        let prepared = prepare_dataset(dataset, &self.config);
        if prepared.test.is_empty() {
            return Err(BenchError::dataset_shape(
                name,
                "no examples left to evaluate after preparation",
            ));
        }
        let resamples = bootstrap_datasets(&prepared, self.config.num_iterations, self.config.seed);

        let mut cache = ModelCache::new(
            &self.config.cache_dir,
            model.model_id(),
            name,
            dataset_config.max_generated_tokens(),
            self.config.hash_inputs(),
        );
        cache.load();

        let metric_names = dataset_config.metric_names();
        let mut metrics = metric_names
            .iter()
            .map(|metric| metric_by_name(metric))
            .collect::<Result<Vec<Box<dyn Metric>>>>()?;

        let cache_metrics = CacheMetrics::new();
        let ctx = IterationContext {
            dataset_config,
            benchmark_config: &self.config,
            cache_metrics: &cache_metrics,
        };

        let mut raw: Vec<RawScore> = Vec::with_capacity(resamples.len());
        for (iteration, resample) in resamples.iter().enumerate() {
            let scores = score_iteration(model, &mut cache, &resample.test, &mut metrics, &ctx)?;
            tracing::debug!(dataset = name, iteration, ?scores, "scored iteration");
            raw.push(scores);
        }

        let score_dict = ScoreDict::from_raw(raw, &metric_names);
        for metric in &metrics {
            if let Some(score) = score_dict.get(metric.name()) {
                tracing::info!(
                    dataset = name,
                    metric = metric.pretty_name(),
                    score = %format_score(score),
                    "benchmark score"
                );
            }
        }
        log_cache_metrics!(cache_metrics, name);

        if self.config.clear_model_cache {
            cache.remove()?;
        }
        Ok(score_dict)
    }

    /// Benchmark `model` on every dataset, appending each result to the log.
    ///
    /// Datasets already logged for this model are skipped unless `force` is
    /// set. A metric that exhausts its attempt budget invalidates only its
    /// dataset; the run moves on to the next one. Any other error stops the run.
    pub fn run<M: Model + ?Sized>(
        &self,
        model: &mut M,
        datasets: &[&DatasetConfig],
    ) -> Result<Vec<BenchmarkResult>> {
        let validation_split = !self.config.evaluate_test_split;
        let smoke_test = self.config.smoke_test;
        let mut results = Vec::with_capacity(datasets.len());

        for dataset_config in datasets {
            let model_id = model.model_id().to_string();
            if !self.config.force
                && self
                    .results
                    .contains(&model_id, &dataset_config.name, validation_split, smoke_test)?
            {
                tracing::info!(
                    model = %model_id,
                    dataset = %dataset_config.name,
                    "result already recorded, skipping"
                );
                continue;
            }

            tracing::info!(
                model = %model_id,
                dataset = dataset_config.display_name(),
                "benchmarking"
            );
            let scores = match self.benchmark_dataset(model, dataset_config) {
                Ok(scores) => scores,
                Err(e @ BenchError::InvalidBenchmark { .. }) => {
                    tracing::error!(dataset = %dataset_config.name, error = %e, "benchmark invalid");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let result = BenchmarkResult {
                dataset: dataset_config.name.clone(),
                task: dataset_config.task,
                languages: dataset_config.languages.clone(),
                model: model_id,
                results: scores,
                validation_split,
                smoke_test,
                num_iterations: self.config.num_iterations,
                timestamp: Utc::now(),
            };
            self.results.append(&result)?;
            results.push(result);
        }

        Ok(results)
    }
}
