//! `polyeval cache` - inspect and clear model output caches

use std::fs;
use std::path::Path;

use polyeval_core::cache::{
    cache_path, model_cache_dir, validate_dataset_name, validate_model_id, ModelCache,
};
use polyeval_core::config::BenchmarkConfig;
use polyeval_core::error::{BenchError, Result};
use polyeval_core::registry::{load_custom_datasets, DatasetRegistry};

use crate::cli::{Cli, OutputFormat};

pub fn show(
    cli: &Cli,
    config: &BenchmarkConfig,
    model: &str,
    dataset: &str,
    datasets_file: &Path,
) -> Result<()> {
    validate_model_id(model)?;
    let registry = DatasetRegistry::from_configs(load_custom_datasets(datasets_file)?)?;
    let dataset_config = registry.get(dataset)?;

    let mut cache = ModelCache::new(
        &config.cache_dir,
        model,
        &dataset_config.name,
        dataset_config.max_generated_tokens(),
        config.hash_inputs(),
    );
    let exists = cache.path().exists();
    cache.load();

    match cli.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "model": model,
                "dataset": dataset_config.name,
                "path": cache.path().display().to_string(),
                "exists": exists,
                "entries": cache.len(),
                "max_generated_tokens": cache.max_generated_tokens(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Human => {
            println!("path: {}", cache.path().display());
            if exists {
                println!("entries: {}", cache.len());
            } else {
                println!("entries: 0 (no cache file)");
            }
            println!("max_generated_tokens: {}", cache.max_generated_tokens());
        }
    }
    Ok(())
}

pub fn clear(cli: &Cli, config: &BenchmarkConfig, model: &str, dataset: Option<&str>) -> Result<()> {
    validate_model_id(model)?;
    let target = match dataset {
        Some(dataset) => {
            validate_dataset_name(dataset)?;
            cache_path(&config.cache_dir, model, dataset)
        }
        None => model_cache_dir(&config.cache_dir, model),
    };

    let removed = if !target.exists() {
        false
    } else if target.is_dir() {
        fs::remove_dir_all(&target)
            .map_err(|e| BenchError::io_operation("remove", target.display(), e))?;
        true
    } else {
        fs::remove_file(&target)
            .map_err(|e| BenchError::io_operation("remove", target.display(), e))?;
        true
    };
    tracing::info!(path = %target.display(), removed, "cleared model cache");

    match cli.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "path": target.display().to_string(),
                "removed": removed,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Human => {
            if !cli.quiet {
                if removed {
                    println!("Removed {}", target.display());
                } else {
                    println!("Nothing to remove at {}", target.display());
                }
            }
        }
    }
    Ok(())
}
