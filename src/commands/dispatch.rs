//! Command dispatch logic for polyeval

use polyeval_core::config::BenchmarkConfig;
use polyeval_core::error::Result;

use crate::cli::{CacheCommands, Cli, Commands};
use crate::commands;

pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => {
            let config = args.apply(load_config(cli)?);
            commands::run::execute(cli, args, config)
        }

        Commands::Datasets { datasets, language } => {
            commands::datasets::execute(cli, datasets, language.as_deref())
        }

        Commands::Results { model, dataset } => {
            let config = load_config(cli)?;
            commands::results::execute(cli, &config, model.as_deref(), dataset.as_deref())
        }

        Commands::Cache { command } => {
            let config = load_config(cli)?;
            match command {
                CacheCommands::Show {
                    model,
                    dataset,
                    datasets,
                } => commands::cache::show(cli, &config, model, dataset, datasets),
                CacheCommands::Clear { model, dataset } => {
                    commands::cache::clear(cli, &config, model, dataset.as_deref())
                }
            }
        }

        Commands::Aggregate { file, metrics } => commands::aggregate::execute(cli, file, metrics),
    }
}

fn load_config(cli: &Cli) -> Result<BenchmarkConfig> {
    let config = BenchmarkConfig::load_or_default(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded benchmark config");
    Ok(config)
}
