//! CLI commands for polyeval

pub mod aggregate;
pub mod cache;
pub mod datasets;
pub mod dispatch;
pub mod results;
pub mod run;
