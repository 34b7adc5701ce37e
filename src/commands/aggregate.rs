//! `polyeval aggregate` - aggregate raw scores produced elsewhere

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use polyeval_core::aggregate::{format_score, RawScore, ScoreDict};
use polyeval_core::error::{BenchError, Result};

use crate::cli::{Cli, OutputFormat};

pub fn execute(cli: &Cli, file: &Path, metrics: &[String]) -> Result<()> {
    let content = fs::read_to_string(file)
        .map_err(|e| BenchError::io_operation("read", file.display(), e))?;
    // null marks an undefined score; it is left out like a missing key
    let parsed: Vec<BTreeMap<String, Option<f64>>> = serde_json::from_str(&content)?;
    let raw: Vec<RawScore> = parsed
        .into_iter()
        .map(|scores| {
            scores
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v)))
                .collect()
        })
        .collect();

    let names: Vec<&str> = metrics.iter().map(String::as_str).collect();
    let score_dict = ScoreDict::from_raw(raw, &names);

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&score_dict)?),
        OutputFormat::Human => {
            for name in &names {
                if let Some(score) = score_dict.get(name) {
                    println!("{}: {}", name, format_score(score));
                }
            }
        }
    }
    Ok(())
}
