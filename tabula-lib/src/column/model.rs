//! Normalized, validated column set.

use std::collections::HashMap;
use std::collections::HashSet;

use super::Column;
use super::Pin;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::model::Row;

/// The validated column set of a table, plus visibility and pinning state.
///
/// Validation happens once, at construction. Column problems are
/// configuration errors and are never recovered per row.
#[derive(Debug, Clone)]
pub struct ColumnModel {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    hidden: HashSet<String>,
    pins: HashMap<String, Pin>,
}

impl ColumnModel {
    /// Validates `columns` and builds the model.
    ///
    /// `representative` is a row whose shape every accessor-less key must
    /// resolve against; pass `None` when no data is available yet.
    ///
    /// # Errors
    ///
    /// - `InvalidColumnKey` for an empty key.
    /// - `DuplicateColumnKey` when two columns share a key.
    /// - `MissingColumnAccessor` when a key does not resolve against
    ///   `representative` and the column has no accessor.
    pub fn new(columns: Vec<Column>, representative: Option<&Row>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if column.key.trim().is_empty() {
                return Err(DataTableError::invalid_column_key(&column.key, "key must not be empty"));
            }
            if index.insert(column.key.clone(), i).is_some() {
                return Err(DataTableError::new(
                    ErrorCode::DuplicateColumnKey,
                    format!("column key '{}' is declared more than once", column.key),
                )
                .with_context("column", column.key.as_str()));
            }
        }

        let model = Self {
            columns,
            index,
            hidden: HashSet::new(),
            pins: HashMap::new(),
        };
        if let Some(row) = representative {
            model.check_shape(row)?;
        }
        Ok(model)
    }

    /// Checks that every accessor-less column resolves against `row`.
    pub fn check_shape(&self, row: &Row) -> Result<()> {
        for column in &self.columns {
            if column.accessor.is_none() && row.get_path(&column.key).is_none() {
                return Err(DataTableError::new(
                    ErrorCode::MissingColumnAccessor,
                    format!(
                        "column '{}' has no accessor and its key does not resolve against row '{}'",
                        column.key,
                        row.id()
                    ),
                )
                .with_context("column", column.key.as_str())
                .with_context("row_id", row.id().as_str()));
            }
        }
        Ok(())
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of declared columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if no columns are declared.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Looks a column up by key.
    pub fn get(&self, key: &str) -> Option<&Column> {
        self.index.get(key).map(|&i| &self.columns[i])
    }

    /// Looks a column up by key, failing with `InvalidColumnKey`.
    pub fn require(&self, key: &str) -> Result<&Column> {
        self.get(key)
            .ok_or_else(|| DataTableError::invalid_column_key(key, "no such column"))
    }

    /// Looks a column up and checks a capability flag.
    pub(crate) fn require_capable(
        &self,
        key: &str,
        capability: &str,
        check: impl Fn(&Column) -> bool,
    ) -> Result<&Column> {
        let column = self.require(key)?;
        if check(column) {
            Ok(column)
        } else {
            Err(DataTableError::invalid_config(format!(
                "column '{key}' is not {capability}"
            ))
            .with_context("column", key))
        }
    }

    // -------------------------------------------------------------------------
    // Visibility
    // -------------------------------------------------------------------------

    /// Hides or shows a hideable column.
    pub fn set_hidden(&mut self, key: &str, hidden: bool) -> Result<()> {
        self.require_capable(key, "hideable", |c| c.hideable)?;
        if hidden {
            self.hidden.insert(key.to_string());
        } else {
            self.hidden.remove(key);
        }
        Ok(())
    }

    /// Returns `true` if the column is hidden.
    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.contains(key)
    }

    // -------------------------------------------------------------------------
    // Pinning
    // -------------------------------------------------------------------------

    /// Pins or unpins a pinnable column.
    pub fn set_pin(&mut self, key: &str, pin: Pin) -> Result<()> {
        self.require_capable(key, "pinnable", |c| c.pinnable)?;
        match pin {
            Pin::None => self.pins.remove(key),
            _ => self.pins.insert(key.to_string(), pin),
        };
        Ok(())
    }

    /// Returns where a column is pinned.
    pub fn pin(&self, key: &str) -> Pin {
        self.pins.get(key).copied().unwrap_or_default()
    }

    /// Visible columns in presentation order: left-pinned, unpinned, then
    /// right-pinned, each group in declaration order.
    pub fn visible_columns(&self) -> Vec<&Column> {
        let mut ordered = Vec::with_capacity(self.columns.len());
        for pin in [Pin::Left, Pin::None, Pin::Right] {
            ordered.extend(
                self.columns
                    .iter()
                    .filter(|c| !self.hidden.contains(&c.key) && self.pin(&c.key) == pin),
            );
        }
        ordered
    }

    /// Columns searched by full-text search.
    ///
    /// `keys` restricts the search to the named columns; `None` searches every
    /// filterable column. Unknown or non-filterable keys are skipped.
    pub fn searchable(&self, keys: Option<&[String]>) -> Vec<&Column> {
        match keys {
            Some(keys) => keys
                .iter()
                .filter_map(|k| self.get(k))
                .filter(|c| c.filterable)
                .collect(),
            None => self.columns.iter().filter(|c| c.filterable).collect(),
        }
    }
}
