//! Column declarations and the column model.

mod model;
mod render;

use std::cmp::Ordering;
use std::sync::Arc;

pub use model::*;
pub use render::*;

use crate::error::CallbackResult;
use crate::group::Aggregation;
use crate::model::Row;
use crate::model::Value;

/// Custom value accessor for a column.
pub type Accessor = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// Custom row comparator for a column.
pub type SortFn = Arc<dyn Fn(&Row, &Row) -> CallbackResult<Ordering> + Send + Sync>;

/// Where a column is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pin {
    /// Not pinned; scrolls with the table.
    #[default]
    None,
    /// Pinned to the leading edge.
    Left,
    /// Pinned to the trailing edge.
    Right,
}

/// Column configuration.
///
/// A column addresses row data by `key`, a dot path into the row, unless it
/// declares a custom accessor. Capability flags gate which table operations
/// the column takes part in.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tabula_lib::column::Column;
/// use tabula_lib::group::Aggregation;
/// use tabula_lib::model::{Row, Value};
///
/// let columns = vec![
///     Column::new("id").header("ID"),
///     Column::new("amt").aggregate(Aggregation::Sum).editable(),
///     Column::new("sign").accessor(Arc::new(|row: &Row| {
///         let negative = row.get("amt").and_then(Value::as_f64).is_some_and(|v| v < 0.0);
///         Value::from(if negative { "neg" } else { "pos" })
///     })),
/// ];
/// ```
#[derive(Clone)]
pub struct Column {
    /// Unique key; doubles as the dot path when no accessor is set.
    pub key: String,
    /// Header label.
    pub header: String,
    /// Custom accessor.
    pub accessor: Option<Accessor>,
    /// Whether the column can be sorted.
    pub sortable: bool,
    /// Whether the column can be filtered and searched.
    pub filterable: bool,
    /// Whether cells in the column can be edited.
    pub editable: bool,
    /// Whether the column can be used as a grouping key.
    pub groupable: bool,
    /// Whether the column can be pinned.
    pub pinnable: bool,
    /// Whether the column can be hidden.
    pub hideable: bool,
    /// Custom comparator.
    pub sort_fn: Option<SortFn>,
    /// Per-bucket aggregation.
    pub aggregation: Option<Aggregation>,
    /// Display renderer.
    pub renderer: Option<Arc<dyn Renderer<String>>>,
    /// Export print value override.
    pub print_value: Option<Arc<dyn Renderer<String>>>,
}

impl Column {
    /// Creates a column addressing `key`.
    ///
    /// Columns are sortable, filterable, groupable, pinnable and hideable by
    /// default; editing has to be enabled explicitly.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            header: key.clone(),
            key,
            accessor: None,
            sortable: true,
            filterable: true,
            editable: false,
            groupable: true,
            pinnable: true,
            hideable: true,
            sort_fn: None,
            aggregation: None,
            renderer: None,
            print_value: None,
        }
    }

    /// Sets the header label.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Sets a custom accessor.
    pub fn accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Enables or disables sorting.
    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    /// Enables or disables filtering and search.
    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    /// Makes the column editable.
    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    /// Enables or disables grouping.
    pub fn groupable(mut self, groupable: bool) -> Self {
        self.groupable = groupable;
        self
    }

    /// Enables or disables pinning.
    pub fn pinnable(mut self, pinnable: bool) -> Self {
        self.pinnable = pinnable;
        self
    }

    /// Enables or disables hiding.
    pub fn hideable(mut self, hideable: bool) -> Self {
        self.hideable = hideable;
        self
    }

    /// Sets a custom comparator.
    pub fn sort_fn(mut self, sort_fn: SortFn) -> Self {
        self.sort_fn = Some(sort_fn);
        self
    }

    /// Declares a per-bucket aggregation.
    pub fn aggregate(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Sets the display renderer.
    pub fn renderer(mut self, renderer: Arc<dyn Renderer<String>>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Sets the export print value override.
    pub fn print_value(mut self, print_value: Arc<dyn Renderer<String>>) -> Self {
        self.print_value = Some(print_value);
        self
    }

    /// Resolves this column's value for `row`.
    ///
    /// Uses the accessor when present, otherwise the dot path `key`. A path
    /// that does not resolve yields `Null`.
    pub fn resolve(&self, row: &Row) -> Value {
        match &self.accessor {
            Some(accessor) => accessor(row),
            None => row.get_path(&self.key).cloned().unwrap_or(Value::Null),
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("has_accessor", &self.accessor.is_some())
            .field("sortable", &self.sortable)
            .field("filterable", &self.filterable)
            .field("editable", &self.editable)
            .field("groupable", &self.groupable)
            .field("aggregation", &self.aggregation)
            .finish_non_exhaustive()
    }
}
