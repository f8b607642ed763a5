//! Filter engine: column filters, full-text search and their evaluation.

mod engine;
mod search;
mod state;

pub(crate) use engine::*;
pub(crate) use search::*;
pub use state::*;
