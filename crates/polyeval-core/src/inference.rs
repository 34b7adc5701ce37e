//! Cache-partitioned inference.
//!
//! Splits a batch into inputs the cache already answers and inputs that need
//! the model, sends only the latter, stores the new outputs, and reassembles
//! the full result in the original input order. For a given cache file every
//! distinct input reaches the model at most once.

use std::collections::HashSet;
use std::time::Instant;

use crate::cache::ModelCache;
use crate::error::{BenchError, Result};
use crate::logging::CacheMetrics;
use crate::model::{GeneratedOutput, Model, ModelInputs};
use crate::trace_time;

/// Positions of a batch split by cache membership
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Partition {
    /// Indices whose output is already cached
    pub cached: Vec<usize>,
    /// Indices that need inference, first occurrence of each distinct input only
    pub non_cached: Vec<usize>,
    /// Later occurrences of inputs already listed in `non_cached`
    pub duplicates: Vec<usize>,
}

/// Split `keys` into cached and non-cached positions, preserving order.
pub fn partition(cache: &ModelCache, keys: &[String]) -> Partition {
    let mut result = Partition::default();
    let mut pending: HashSet<&str> = HashSet::new();

    for (index, key) in keys.iter().enumerate() {
        if cache.contains_key(key) {
            result.cached.push(index);
        } else if pending.insert(key.as_str()) {
            result.non_cached.push(index);
        } else {
            result.duplicates.push(index);
        }
    }
    result
}

/// Generate outputs for `inputs`, invoking `model` only for inputs missing from `cache`.
///
/// New outputs are added to the cache and the cache is saved before the result
/// is assembled. The returned outputs line up with `inputs` position by position.
pub fn generate_with_cache<M: Model + ?Sized>(
    model: &mut M,
    cache: &mut ModelCache,
    inputs: &ModelInputs,
    metrics: &CacheMetrics,
) -> Result<Vec<GeneratedOutput>> {
    let start = Instant::now();
    let keys: Vec<String> = inputs
        .to_inputs()
        .iter()
        .map(|input| cache.key_for(input))
        .collect();
    let parts = partition(cache, &keys);

    metrics.record_cache_hits(parts.cached.len() as u64);
    metrics.record_cache_misses((parts.non_cached.len() + parts.duplicates.len()) as u64);
    tracing::debug!(
        model = model.model_id(),
        cached = parts.cached.len(),
        non_cached = parts.non_cached.len(),
        duplicates = parts.duplicates.len(),
        "partitioned inputs by cache membership"
    );

    if !parts.non_cached.is_empty() {
        let batch = inputs.select(&parts.non_cached);
        metrics.record_model_call();
        let outputs = model.generate(&batch)?;
        if outputs.len() != batch.len() {
            return Err(BenchError::model_failure(
                model.model_id(),
                format!(
                    "returned {} outputs for {} inputs",
                    outputs.len(),
                    batch.len()
                ),
            ));
        }
        cache.add_to_cache(&batch, &outputs)?;
        cache.save()?;
    }

    let results = keys
        .iter()
        .map(|key| {
            cache.get_by_key(key).cloned().ok_or_else(|| {
                BenchError::Other(format!("model cache has no output for key {}", key))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    trace_time!(start, "generate_with_cache", inputs = inputs.len());
    Ok(results)
}
