//! A model backed by an external shell command.
//!
//! Each input is written to the command's stdin as JSON (`{"text": ...}` or
//! `{"messages": [...]}`). Stdout is read back either as a JSON
//! [`GeneratedOutput`] or, failing that, as the plain generated text.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{GeneratedOutput, Model, ModelInputs};
use crate::concurrency::run_bounded;
use crate::error::{BenchError, Result};

/// Runs `sh -c <command>` once per input, a bounded number at a time
#[derive(Debug, Clone)]
pub struct CommandModel {
    model_id: String,
    command: String,
    max_concurrent: usize,
}

impl CommandModel {
    pub fn new(model_id: impl Into<String>, command: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            model_id: model_id.into(),
            command: command.into(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Model for CommandModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn generate(&mut self, inputs: &ModelInputs) -> Result<Vec<GeneratedOutput>> {
        let mut futures = Vec::with_capacity(inputs.len());
        for input in inputs.to_inputs() {
            let payload = serde_json::to_vec(&input)?;
            futures.push(run_once(
                self.command.clone(),
                self.model_id.clone(),
                payload,
            ));
        }

        let results = run_bounded(futures, self.max_concurrent)?;

        let mut outputs = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    tracing::warn!(model = %self.model_id, index, error = %e, "model command failed");
                    failures.push(e.to_string());
                }
            }
        }

        if let Some(first) = failures.first() {
            return Err(BenchError::model_failure(
                &self.model_id,
                format!(
                    "{} of {} inputs failed (first error: {})",
                    failures.len(),
                    inputs.len(),
                    first
                ),
            ));
        }
        Ok(outputs)
    }
}

async fn run_once(
    command: String,
    model_id: String,
    payload: Vec<u8>,
) -> std::result::Result<GeneratedOutput, String> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .env("POLYEVAL_MODEL_ID", &model_id)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn '{}': {}", command, e))?;

    // Stdin is fed while stdout is drained; a command echoing a prompt larger
    // than the pipe buffer would otherwise block both sides
    let stdin = child.stdin.take();
    let feed = async move {
        if let Some(mut stdin) = stdin {
            // A command that ignores its input may close stdin early
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!(error = %e, "model command closed stdin early");
            }
        }
    };
    let ((), output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(|e| format!("failed to wait for '{}': {}", command, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "'{}' exited with {}: {}",
            command,
            output.status,
            stderr.trim()
        ));
    }

    Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Interpret command stdout as a JSON output object or as plain text
pub(crate) fn parse_output(stdout: &str) -> GeneratedOutput {
    let trimmed = stdout.trim();
    if trimmed.starts_with('{') {
        if let Ok(output) = serde_json::from_str::<GeneratedOutput>(trimmed) {
            return output;
        }
    }
    GeneratedOutput::new(trimmed)
}
