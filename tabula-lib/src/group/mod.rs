//! Grouping and aggregation engine.

mod aggregate;
mod engine;
mod state;

pub use aggregate::*;
pub use engine::Bucket;
pub(crate) use engine::Entry;
pub(crate) use engine::build_groups;
pub(crate) use engine::flatten;
pub use state::*;
