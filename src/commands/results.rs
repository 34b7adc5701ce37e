//! `polyeval results` - show the results log

use polyeval_core::aggregate::format_score;
use polyeval_core::config::BenchmarkConfig;
use polyeval_core::error::Result;
use polyeval_core::results::ResultsLog;

use crate::cli::{Cli, OutputFormat};

pub fn execute(
    cli: &Cli,
    config: &BenchmarkConfig,
    model: Option<&str>,
    dataset: Option<&str>,
) -> Result<()> {
    let results: Vec<_> = ResultsLog::new(config.results_path.clone())
        .load_all()?
        .into_iter()
        .filter(|r| model.map_or(true, |m| r.model == m))
        .filter(|r| dataset.map_or(true, |d| r.dataset == d))
        .collect();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Human => {
            if results.is_empty() && !cli.quiet {
                println!("No results recorded");
            }
            for result in &results {
                let scores: Vec<String> = result
                    .results
                    .metric_names()
                    .into_iter()
                    .filter_map(|m| {
                        let score = result.results.get(&m)?;
                        Some(format!("{}={}", m, format_score(score)))
                    })
                    .collect();
                let smoke = if result.smoke_test { " [smoke test]" } else { "" };
                println!(
                    "{}\t{}\t{}{}\t{}",
                    result.timestamp.format("%Y-%m-%d %H:%M"),
                    result.model,
                    result.dataset,
                    smoke,
                    scores.join(" ")
                );
            }
        }
    }
    Ok(())
}
