//! Bootstrap resampling of benchmark datasets.
//!
//! Every iteration of a benchmark scores a different resample (drawn with
//! replacement, same size as the original) of each split. The spread of the
//! per-iteration scores is what the reported confidence interval measures.
//!
//! All resamples come from one seeded ChaCha stream, drawn split by split
//! (every iteration of `train`, then `val`, then `test`), so the full set is
//! reproducible from the seed alone and stable across platforms.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::BenchmarkConfig;
use crate::dataset::{Dataset, Split};

/// Resampled row indices for one split, one vector per iteration
pub type SplitIndices = Vec<Vec<usize>>;

/// Row indices drawn for every split and iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapIndices {
    pub train: SplitIndices,
    pub val: SplitIndices,
    pub test: SplitIndices,
}

/// Apply the pre-bootstrap transformations a benchmark run asks for.
///
/// Order matters: empty inputs are filtered from all splits first, then the
/// validation split replaces the test split unless the real test split is
/// being evaluated, then smoke runs cut the test split down to one row.
/// Resampling always operates on the result.
pub fn prepare_dataset(dataset: Dataset, config: &BenchmarkConfig) -> Dataset {
    let mut dataset = dataset.filter_empty();

    if !config.evaluate_test_split {
        dataset.test = dataset.val.clone();
    }

    if config.smoke_test {
        let keep = dataset.test.len().min(1);
        dataset.test = Split(dataset.test.0.into_iter().take(keep).collect());
    }

    dataset
}

/// Draw bootstrap indices for splits of the given sizes.
pub fn bootstrap_indices(
    split_sizes: [usize; 3],
    num_iterations: usize,
    seed: u64,
) -> BootstrapIndices {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let [train, val, test] = split_sizes.map(|size| draw_split(&mut rng, size, num_iterations));
    BootstrapIndices { train, val, test }
}

fn draw_split<R: Rng>(rng: &mut R, size: usize, num_iterations: usize) -> SplitIndices {
    (0..num_iterations)
        .map(|_| {
            if size == 0 {
                Vec::new()
            } else {
                (0..size).map(|_| rng.gen_range(0..size)).collect()
            }
        })
        .collect()
}

/// Materialize `num_iterations` resampled copies of `dataset`.
///
/// The original dataset is left untouched. Every resample is built before
/// this returns, so no inference can start on a partially drawn set.
pub fn bootstrap_datasets(dataset: &Dataset, num_iterations: usize, seed: u64) -> Vec<Dataset> {
    let indices = bootstrap_indices(
        [dataset.train.len(), dataset.val.len(), dataset.test.len()],
        num_iterations,
        seed,
    );

    (0..num_iterations)
        .map(|i| Dataset {
            train: dataset.train.select(&indices.train[i]),
            val: dataset.val.select(&indices.val[i]),
            test: dataset.test.select(&indices.test[i]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Example;

    fn split(prefix: &str, n: usize) -> Split {
        Split(
            (0..n)
                .map(|i| Example::new(format!("{prefix}-{i}").as_str(), format!("label-{}", i % 2)))
                .collect(),
        )
    }

    fn dataset() -> Dataset {
        Dataset {
            train: split("train", 8),
            val: split("val", 5),
            test: split("test", 6),
        }
    }

    #[test]
    fn test_same_seed_same_indices() {
        let a = bootstrap_indices([8, 5, 6], 4, 4242);
        let b = bootstrap_indices([8, 5, 6], 4, 4242);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_indices() {
        let a = bootstrap_indices([50, 50, 50], 3, 1);
        let b = bootstrap_indices([50, 50, 50], 3, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_indices_shape_and_range() {
        let indices = bootstrap_indices([8, 5, 6], 3, 4242);
        assert_eq!(indices.train.len(), 3);
        for draw in &indices.val {
            assert_eq!(draw.len(), 5);
            assert!(draw.iter().all(|&i| i < 5));
        }
    }

    #[test]
    fn test_iterations_differ() {
        let indices = bootstrap_indices([100, 0, 0], 2, 4242);
        assert_ne!(indices.train[0], indices.train[1]);
    }

    #[test]
    fn test_empty_split_stays_empty() {
        let indices = bootstrap_indices([0, 3, 0], 2, 4242);
        assert_eq!(indices.train, vec![Vec::<usize>::new(), Vec::new()]);
        assert_eq!(indices.test, vec![Vec::<usize>::new(), Vec::new()]);
    }

    #[test]
    fn test_bootstrap_datasets_preserves_original() {
        let original = dataset();
        let resamples = bootstrap_datasets(&original, 5, 4242);
        assert_eq!(resamples.len(), 5);
        assert_eq!(original, dataset());
        for resample in &resamples {
            assert_eq!(resample.train.len(), 8);
            assert_eq!(resample.val.len(), 5);
            assert_eq!(resample.test.len(), 6);
            assert!(resample
                .test
                .examples()
                .iter()
                .all(|e| original.test.examples().contains(e)));
        }
    }

    #[test]
    fn test_prepare_uses_val_as_test_by_default() {
        let prepared = prepare_dataset(dataset(), &BenchmarkConfig::default());
        assert_eq!(prepared.test, prepared.val);
    }

    #[test]
    fn test_prepare_keeps_test_when_evaluating_test_split() {
        let config = BenchmarkConfig {
            evaluate_test_split: true,
            ..Default::default()
        };
        let prepared = prepare_dataset(dataset(), &config);
        assert_eq!(prepared.test, split("test", 6));
    }

    #[test]
    fn test_smoke_test_truncates_before_resampling() {
        let config = BenchmarkConfig {
            evaluate_test_split: true,
            smoke_test: true,
            ..Default::default()
        };
        let prepared = prepare_dataset(dataset(), &config);
        assert_eq!(prepared.test.len(), 1);

        for resample in bootstrap_datasets(&prepared, 3, 4242) {
            assert_eq!(resample.test, prepared.test);
        }
    }

    #[test]
    fn test_prepare_filters_empty_before_substitution() {
        let mut ds = dataset();
        ds.val.0.push(Example::new("  ", "label-0"));
        let prepared = prepare_dataset(ds, &BenchmarkConfig::default());
        assert_eq!(prepared.test.len(), 5);
    }
}
