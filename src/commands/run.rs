//! `polyeval run` - benchmark a command-backed model

use polyeval_core::aggregate::format_score;
use polyeval_core::bail_usage;
use polyeval_core::benchmark::Benchmarker;
use polyeval_core::config::BenchmarkConfig;
use polyeval_core::error::Result;
use polyeval_core::model::CommandModel;
use polyeval_core::registry::{load_custom_datasets, DatasetConfig, DatasetRegistry};
use polyeval_core::results::BenchmarkResult;

use crate::cli::{Cli, OutputFormat, RunArgs};

pub fn execute(cli: &Cli, args: &RunArgs, config: BenchmarkConfig) -> Result<()> {
    config.validate()?;
    let registry = DatasetRegistry::from_configs(load_custom_datasets(&args.datasets)?)?;
    let selected = select_datasets(&registry, &args.dataset_names, &args.languages)?;
    if selected.is_empty() {
        bail_usage!("no datasets match the given --dataset/--language filters");
    }

    let mut model = CommandModel::new(&args.model, &args.command, args.max_concurrent);
    let benchmarker = Benchmarker::new(config);
    let results = benchmarker.run(&mut model, &selected)?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Human => output_human(cli, &results),
    }
    Ok(())
}

/// Datasets named with `--dataset` (all when none are named), narrowed by `--language`
fn select_datasets<'a>(
    registry: &'a DatasetRegistry,
    names: &[String],
    languages: &[String],
) -> Result<Vec<&'a DatasetConfig>> {
    let candidates: Vec<&DatasetConfig> = if names.is_empty() {
        registry.iter().collect()
    } else {
        names
            .iter()
            .map(|name| registry.get(name))
            .collect::<Result<_>>()?
    };

    Ok(candidates
        .into_iter()
        .filter(|dataset| {
            languages.is_empty() || dataset.languages.iter().any(|l| languages.contains(l))
        })
        .collect())
}

fn output_human(cli: &Cli, results: &[BenchmarkResult]) {
    if results.is_empty() {
        if !cli.quiet {
            println!("Nothing to do: every dataset already has a result (use --force to re-run)");
        }
        return;
    }

    for result in results {
        let split = if result.validation_split { " (validation split)" } else { "" };
        let smoke = if result.smoke_test { " [smoke test]" } else { "" };
        println!("{} on {}{}{}", result.model, result.dataset, split, smoke);
        for metric in result.results.metric_names() {
            if let Some(score) = result.results.get(&metric) {
                println!("  {}: {}", metric, format_score(score));
            }
        }
    }
}
