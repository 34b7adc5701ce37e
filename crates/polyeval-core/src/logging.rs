use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Cache lookup counters for structured logging.
///
/// Tracks how many model inputs were served from the model output cache
/// versus sent to the model. All operations are atomic and lock-free.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    model_calls: AtomicU64,
}

impl CacheMetrics {
    /// Create a new CacheMetrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` inputs served from the cache
    pub fn record_cache_hits(&self, count: u64) {
        self.cache_hits.fetch_add(count, Ordering::Relaxed);
    }

    /// Record `count` inputs that needed inference
    pub fn record_cache_misses(&self, count: u64) {
        self.cache_misses.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one batch-generation call to the model
    pub fn record_model_call(&self) {
        self.model_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn model_calls(&self) -> u64 {
        self.model_calls.load(Ordering::Relaxed)
    }

    /// Get cache hit rate as a percentage (0.0-100.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits();
        let total = hits + self.cache_misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.model_calls.store(0, Ordering::Relaxed);
    }
}

/// Log cache metrics at debug level.
///
/// Usage:
/// ```rust,ignore
/// let metrics = CacheMetrics::new();
/// // ... run inference ...
/// log_cache_metrics!(&metrics, "angry-tweets");
/// ```
#[macro_export]
macro_rules! log_cache_metrics {
    ($metrics:expr, $name:expr) => {
        tracing::debug!(
            dataset = $name,
            cache_hits = $metrics.cache_hits(),
            cache_misses = $metrics.cache_misses(),
            model_calls = $metrics.model_calls(),
            cache_hit_rate = $metrics.cache_hit_rate(),
            "cache_metrics"
        );
    };
}

/// Helper macro for logging elapsed time at trace level.
#[macro_export]
macro_rules! trace_time {
    ($start:expr, $name:expr) => {
        tracing::trace!(elapsed = ?$start.elapsed(), $name);
    };
    ($start:expr, $name:expr $(, $field:ident = $value:expr)*) => {
        tracing::trace!(elapsed = ?$start.elapsed(), $($field = $value),*, $name);
    };
}

/// Initialize structured logging based on CLI arguments
pub fn init_tracing(
    verbose: bool,
    log_level: Option<&str>,
    log_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let level = match (verbose, log_level) {
        (true, None) => "polyeval=debug,polyeval_core=debug",
        (false, None) => "polyeval=info,polyeval_core=info",
        (_, Some(level)) => return init_with_level(level, log_json),
    };

    init_with_level(level, log_json)
}

fn init_with_level(level: &str, log_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    // POLYEVAL_LOG takes precedence over RUST_LOG and the CLI level
    let filter = EnvFilter::try_from_env("POLYEVAL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| {
            EnvFilter::new(if level.contains('=') {
                level.to_string()
            } else {
                format!("polyeval={},polyeval_core={}", level, level)
            })
        });

    let registry = tracing_subscriber::registry().with(filter);

    if log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_empty() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_and_reset() {
        let metrics = CacheMetrics::new();
        metrics.record_cache_hits(3);
        metrics.record_cache_misses(1);
        metrics.record_model_call();
        assert_eq!(metrics.cache_hit_rate(), 75.0);
        assert_eq!(metrics.model_calls(), 1);

        metrics.reset();
        assert_eq!(metrics.cache_hits(), 0);
        assert_eq!(metrics.cache_misses(), 0);
        assert_eq!(metrics.model_calls(), 0);
    }
}
