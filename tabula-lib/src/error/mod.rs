//! Error types

mod callback;
mod code;
mod table;

pub use callback::*;
pub use code::*;
pub use table::*;
