//! Selection manager.

mod manager;
mod resolver;

pub use manager::*;
pub use resolver::*;
