//! Sort engine: sort state, the default comparator and the stable sort.

mod compare;
mod engine;
mod state;

pub use compare::*;
pub(crate) use engine::*;
pub use state::*;
