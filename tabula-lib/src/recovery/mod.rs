//! Error recovery: strategies, the per-table registry, and host reporting.
//!
//! Every pipeline stage that calls into host code routes failures through
//! the table's [`RecoveryRegistry`]. Fatal categories (data, column, config,
//! context) never get here; they are returned as `Err` from setup.

mod registry;
mod report;
mod strategy;

pub use registry::*;
pub use report::*;
pub use strategy::*;
