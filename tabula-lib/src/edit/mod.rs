//! Inline cell editing.

mod controller;
mod persist;
mod session;

pub use controller::*;
pub use persist::*;
pub use session::*;
