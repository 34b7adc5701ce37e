//! `polyeval datasets` - list custom datasets

use std::path::Path;

use polyeval_core::error::Result;
use polyeval_core::registry::{load_custom_datasets, DatasetRegistry};

use crate::cli::{Cli, OutputFormat};

pub fn execute(cli: &Cli, path: &Path, language: Option<&str>) -> Result<()> {
    let registry = DatasetRegistry::from_configs(load_custom_datasets(path)?)?;
    let datasets: Vec<_> = match language {
        Some(language) => registry.for_language(language).collect(),
        None => registry.iter().collect(),
    };

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&datasets)?),
        OutputFormat::Human => {
            if datasets.is_empty() && !cli.quiet {
                println!("No datasets found");
            }
            for dataset in datasets {
                println!(
                    "{}\t{}\t{}\t{}",
                    dataset.name,
                    dataset.task,
                    dataset.languages.join(","),
                    dataset.metric_names().join(",")
                );
            }
        }
    }
    Ok(())
}
