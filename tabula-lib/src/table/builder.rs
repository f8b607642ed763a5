//! Typestate builder for [`DataTable`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::Collaborators;
use super::DataTable;
use super::Snapshot;
use super::index_rows;
use crate::column::Column;
use crate::column::ColumnModel;
use crate::config::DataMode;
use crate::config::TableConfig;
use crate::edit::CellPersistence;
use crate::edit::CellValidator;
use crate::edit::EditController;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::filter::FilterState;
use crate::group::GroupState;
use crate::model::Row;
use crate::pagination::Paginator;
use crate::pagination::RemoteDataSource;
use crate::pagination::RequestSequencer;
use crate::recovery::ErrorSink;
use crate::recovery::RecoveryRegistry;
use crate::recovery::RecoveryStrategy;
use crate::search::SearchDebouncer;
use crate::selection::SelectAllResolver;
use crate::selection::SelectionManager;
use crate::sort::SortState;
use crate::virtualization::RowMeasure;
use crate::virtualization::ViewportSlot;
use crate::virtualization::Windower;

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for a [`DataTable`].
///
/// Columns are required; everything else has a default. Collaborators are
/// optional at build time and checked when an operation needs them.
///
/// # Example
///
/// ```
/// use tabula_lib::column::Column;
/// use tabula_lib::config::TableConfig;
/// use tabula_lib::error::{DataTableError, ErrorCode};
/// use tabula_lib::recovery::{Fallback, RecoveryStrategy};
/// use tabula_lib::table::DataTable;
///
/// let table = DataTable::builder()
///     .columns(vec![Column::new("id"), Column::new("name")])
///     .rows_json(serde_json::json!([{"id": "a", "name": "Ada"}]))
///     .config(TableConfig::default().page_size(25))
///     .strategy(ErrorCode::FilterFailed, RecoveryStrategy::new(Fallback::Exclude))
///     .error_sink(|e: &DataTableError| eprintln!("{e}"))
///     .build()
///     .unwrap();
/// assert_eq!(table.rows().len(), 1);
/// ```
pub struct DataTableBuilder<C> {
    columns: C,
    rows: Vec<Row>,
    rows_json: Option<serde_json::Value>,
    config: TableConfig,
    registry: RecoveryRegistry,
    sink: Option<Arc<dyn ErrorSink>>,
    collaborators: Collaborators,
}

impl DataTableBuilder<Missing> {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            columns: Missing,
            rows: Vec::new(),
            rows_json: None,
            config: TableConfig::default(),
            registry: RecoveryRegistry::default(),
            sink: None,
            collaborators: Collaborators::default(),
        }
    }

    /// Sets the columns.
    pub fn columns(self, columns: Vec<Column>) -> DataTableBuilder<Set<Vec<Column>>> {
        DataTableBuilder {
            columns: Set(columns),
            rows: self.rows,
            rows_json: self.rows_json,
            config: self.config,
            registry: self.registry,
            sink: self.sink,
            collaborators: self.collaborators,
        }
    }
}

impl Default for DataTableBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> DataTableBuilder<C> {
    /// Sets the initial rows.
    pub fn rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Sets the initial rows from a JSON array of row objects. Takes
    /// precedence over [`rows`](Self::rows).
    pub fn rows_json(mut self, rows: serde_json::Value) -> Self {
        self.rows_json = Some(rows);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the recovery registry.
    pub fn registry(mut self, registry: RecoveryRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Overrides the recovery strategy for one error code.
    pub fn strategy(mut self, code: ErrorCode, strategy: RecoveryStrategy) -> Self {
        self.registry = self.registry.with_strategy(code, strategy);
        self
    }

    /// Sets the host error channel.
    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Binds the remote page source.
    pub fn remote_source(mut self, source: impl RemoteDataSource + 'static) -> Self {
        self.collaborators.remote = Some(Arc::new(source));
        self
    }

    /// Binds the select-all-filtered resolver.
    pub fn select_all_resolver(mut self, resolver: impl SelectAllResolver + 'static) -> Self {
        self.collaborators.resolver = Some(Arc::new(resolver));
        self
    }

    /// Binds cell persistence for edit commits.
    pub fn persistence(mut self, persistence: impl CellPersistence + 'static) -> Self {
        self.collaborators.persistence = Some(Arc::new(persistence));
        self
    }

    /// Binds the cell validator.
    pub fn validator(mut self, validator: impl CellValidator + 'static) -> Self {
        self.collaborators.validator = Some(Arc::new(validator));
        self
    }

    /// Binds row height measurement.
    pub fn measure(mut self, measure: impl RowMeasure + 'static) -> Self {
        self.collaborators.measure = Some(Arc::new(measure));
        self
    }
}

impl DataTableBuilder<Set<Vec<Column>>> {
    /// Builds the table.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` / `IncompatibleConfig` from
    ///   [`TableConfig::validate`].
    /// - `MissingConfig` for an empty column list.
    /// - Column errors from [`ColumnModel::new`].
    /// - Row errors (`InvalidDataFormat`, `MissingRowId`, `DuplicateRowId`).
    pub fn build(self) -> Result<DataTable> {
        let config = self.config;
        config.validate()?;

        let columns = self.columns.0;
        if columns.is_empty() {
            return Err(DataTableError::new(
                ErrorCode::MissingConfig,
                "a table needs at least one column",
            )
            .with_context("field", "columns"));
        }

        let rows = match self.rows_json {
            Some(json) => Row::from_json_array(json)?,
            None => self.rows,
        };
        let row_index = index_rows(&rows)?;
        let representative = match config.mode {
            DataMode::Local => rows.first(),
            DataMode::Remote => None,
        };
        let columns = ColumnModel::new(columns, representative)?;
        let shape_checked = representative.is_some();

        let mut filters = FilterState::new();
        filters.search_mut().columns = config.search_columns.clone();
        filters.search_mut().mode = config.search_mode;

        log::debug!(
            "built table: {} columns, {} rows, {:?} mode",
            columns.len(),
            rows.len(),
            config.mode
        );

        Ok(DataTable {
            columns,
            rows,
            row_index,
            registry: self.registry,
            sink: self.sink,
            collaborators: self.collaborators,
            filters,
            sort: SortState::new(config.max_sort_columns),
            groups: GroupState::new(),
            paginator: Paginator::new(config.pagination, config.page_size),
            windower: Windower::new(
                config.virtualize,
                config.virtualize_threshold,
                config.estimate_row_height,
                config.overscan,
            ),
            viewport: ViewportSlot::default(),
            selection: SelectionManager::new(config.selection_mode),
            edits: EditController::new(),
            search: SearchDebouncer::new(config.search_delay()),
            sequencer: RequestSequencer::default(),
            remote_total: None,
            cancel: CancellationToken::new(),
            torn_down: false,
            snapshot: Snapshot::default(),
            shape_checked,
            config,
        })
    }
}
