//! Virtualization windower: which rows to materialize for a viewport.

mod viewport;
mod window;

pub use viewport::Viewport;
pub use viewport::ViewportAttachment;
pub(crate) use viewport::ViewportSlot;
pub use window::*;
