//! Driving async work to completion from synchronous code.
//!
//! The benchmark pipeline is synchronous. Backends that are naturally async
//! (subprocesses, HTTP clients) get a private current-thread runtime here,
//! with a semaphore bounding how many items run at once. Each item's outcome
//! comes back as its own `Result`, so one failure never aborts the batch.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::error::{BenchError, Result};

/// Failure of a single item in a bounded batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task was cancelled")]
    Cancelled,
}

/// Run `futures` with at most `max_concurrent` in flight; results are in input order.
///
/// Errors returned by a future become [`TaskError::Failed`], panics become
/// [`TaskError::Panicked`]. Only failing to start the runtime is an error of
/// the call itself.
pub fn run_bounded<T, E, F>(
    futures: Vec<F>,
    max_concurrent: usize,
) -> Result<Vec<std::result::Result<T, TaskError>>>
where
    F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| BenchError::Other(format!("failed to start async runtime: {}", e)))?;

    Ok(runtime.block_on(async move {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(futures.len());

        for future in futures {
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail
                let _permit = semaphore.acquire_owned().await.ok();
                future.await.map_err(|e| e.to_string())
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(message)) => Err(TaskError::Failed(message)),
                Err(join_error) if join_error.is_panic() => {
                    Err(TaskError::Panicked(panic_message(join_error.into_panic())))
                }
                Err(_) => Err(TaskError::Cancelled),
            };
            results.push(result);
        }
        results
    }))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
