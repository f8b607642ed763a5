//! Tabula table engine
//!
//! The row-processing and interaction engine behind a data table widget:
//! raw rows plus column, filter, sort, group, selection and edit state in,
//! the exact ordered, paginated and windowed rows to display out, with a
//! recoverable error surface for host-supplied callbacks.
//!
//! Start with [`table::DataTable::builder`].

pub mod column;
pub mod config;
pub mod edit;
pub mod error;
pub mod export;
pub mod filter;
pub mod group;
pub mod model;
pub mod pagination;
pub mod recovery;
pub mod search;
pub mod selection;
pub mod sort;
pub mod table;
pub mod virtualization;

pub use table::DataTable;
