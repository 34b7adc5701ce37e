//! Polyeval Core Library
//!
//! Core of the polyeval multilingual benchmark harness: the persistent model
//! output cache and the inference driver built on it, bootstrap resampling of
//! datasets, per-iteration scoring with retries, and score aggregation.

pub mod aggregate;
pub mod benchmark;
pub mod bootstrap;
pub mod cache;
pub mod concurrency;
pub mod config;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod labels;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod results;
pub mod scoring;
