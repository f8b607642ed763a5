//! The table facade.
//!
//! [`DataTable`] owns every piece of state (rows, columns, filters, sort,
//! grouping, pagination, virtualization, selection, edit sessions) and runs
//! the row pipeline on [`refresh`](DataTable::refresh). State changes only
//! through its methods.

mod builder;
mod edit;
mod remote;
mod view;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

pub use builder::*;
pub use remote::*;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
pub use view::*;

use crate::column::ColumnModel;
use crate::column::Pin;
use crate::config::DataMode;
use crate::config::TableConfig;
use crate::edit::CellPersistence;
use crate::edit::CellValidator;
use crate::edit::EditController;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::error::guard_async;
use crate::filter::ColumnFilter;
use crate::filter::FilterState;
use crate::group::BucketComparator;
use crate::group::BucketPath;
use crate::group::GroupState;
use crate::model::Row;
use crate::model::RowId;
use crate::pagination::Paginator;
use crate::pagination::RemoteDataSource;
use crate::pagination::RequestSequencer;
use crate::recovery::ErrorSink;
use crate::recovery::RecoveryRegistry;
use crate::search::SearchDebouncer;
use crate::selection::SelectAllResolver;
use crate::selection::SelectionAction;
use crate::selection::SelectionManager;
use crate::sort::SortKey;
use crate::sort::SortState;
use crate::virtualization::ItemKey;
use crate::virtualization::RowMeasure;
use crate::virtualization::ViewportAttachment;
use crate::virtualization::ViewportSlot;
use crate::virtualization::Windower;

/// Host collaborators bound at build time. Cleared on teardown.
#[derive(Default, Clone)]
pub(crate) struct Collaborators {
    pub(crate) remote: Option<Arc<dyn RemoteDataSource>>,
    pub(crate) resolver: Option<Arc<dyn SelectAllResolver>>,
    pub(crate) persistence: Option<Arc<dyn CellPersistence>>,
    pub(crate) validator: Option<Arc<dyn CellValidator>>,
    pub(crate) measure: Option<Arc<dyn RowMeasure>>,
}

/// Results of the last pipeline pass that later calls work against.
#[derive(Debug, Default)]
struct Snapshot {
    /// Filtered, sorted row indices.
    order: Vec<usize>,
    /// Ids of `order`.
    filtered_ids: Vec<RowId>,
    /// Leaf row indices on the current page.
    page_rows: Vec<usize>,
    /// Size-cache keys of the current page's display rows.
    page_keys: Vec<ItemKey>,
    /// Display rows across all pages.
    display_total: usize,
}

/// A data table instance.
///
/// Built with [`DataTable::builder`]. Call [`refresh`](Self::refresh) after
/// changing state to get the rows to display; selection, edits and exports
/// work against the state of the last refresh.
///
/// # Example
///
/// ```
/// use tabula_lib::column::Column;
/// use tabula_lib::filter::ColumnFilter;
/// use tabula_lib::sort::SortKey;
/// use tabula_lib::table::DataTable;
///
/// let mut table = DataTable::builder()
///     .columns(vec![Column::new("id"), Column::new("amt")])
///     .rows_json(serde_json::json!([
///         {"id": 1, "amt": -50},
///         {"id": 2, "amt": 100},
///         {"id": 3, "amt": 100},
///     ]))
///     .build()
///     .unwrap();
///
/// table.set_sort(vec![SortKey::desc("amt"), SortKey::asc("id")]).unwrap();
/// table.set_filter("amt", ColumnFilter::number_range(Some(0.0), None)).unwrap();
///
/// let view = table.refresh().unwrap();
/// let ids: Vec<&str> = view.filtered_ids.iter().map(|id| id.as_str()).collect();
/// assert_eq!(ids, ["2", "3"]);
/// ```
pub struct DataTable {
    config: TableConfig,
    columns: ColumnModel,
    rows: Vec<Row>,
    row_index: HashMap<RowId, usize>,
    registry: RecoveryRegistry,
    sink: Option<Arc<dyn ErrorSink>>,
    collaborators: Collaborators,
    filters: FilterState,
    sort: SortState,
    groups: GroupState,
    paginator: Paginator,
    windower: Windower,
    viewport: ViewportSlot,
    selection: SelectionManager,
    edits: EditController,
    search: SearchDebouncer,
    sequencer: RequestSequencer,
    remote_total: Option<usize>,
    cancel: CancellationToken,
    torn_down: bool,
    snapshot: Snapshot,
    /// Whether the column shape has been checked against a data row.
    shape_checked: bool,
}

impl DataTable {
    /// Creates a builder.
    pub fn builder() -> DataTableBuilder<Missing> {
        DataTableBuilder::new()
    }

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------

    /// The configuration.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// The column model.
    pub fn columns(&self) -> &ColumnModel {
        &self.columns
    }

    /// All rows held by the table, in dataset order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Looks a row up by id.
    pub fn row(&self, id: &RowId) -> Option<&Row> {
        self.row_index.get(id).map(|&i| &self.rows[i])
    }

    /// Replaces the dataset.
    ///
    /// Selections and edit sessions on rows that no longer exist are
    /// dropped. In remote mode the rows are the current page, so selection
    /// is left alone.
    ///
    /// # Errors
    ///
    /// - `DuplicateRowId` when two rows share an id.
    /// - `MissingColumnAccessor` when the first rows ever loaded into a
    ///   local table do not match the columns. Later loads, and remote
    ///   pages, may leave optional fields out.
    pub fn set_rows(&mut self, rows: Vec<Row>) -> Result<()> {
        let row_index = index_rows(&rows)?;
        if !self.shape_checked && self.config.mode == DataMode::Local && !rows.is_empty() {
            self.columns.check_shape(&rows[0])?;
            self.shape_checked = true;
        }
        self.rows = rows;
        self.row_index = row_index;

        let index = &self.row_index;
        let cancelled = self.edits.cancel_where(|id| index.contains_key(id));
        self.windower.retain_sizes(|key| match key {
            ItemKey::Row(id) => index.contains_key(id),
            ItemKey::Group(_) => true,
        });
        if self.config.mode == DataMode::Local {
            let dropped = self.selection.retain_existing(|id| index.contains_key(id));
            log::debug!(
                "loaded {} rows; dropped {dropped} selected ids and {} edits",
                self.rows.len(),
                cancelled.len()
            );
        }
        Ok(())
    }

    /// Replaces the dataset from a JSON array of row objects.
    pub fn set_rows_json(&mut self, rows: serde_json::Value) -> Result<()> {
        self.set_rows(Row::from_json_array(rows)?)
    }

    /// Resolved value of a cell.
    pub fn cell_value(&self, row_id: &RowId, column: &str) -> Option<crate::model::Value> {
        let column = self.columns.get(column)?;
        self.row(row_id).map(|row| column.resolve(row))
    }

    // -------------------------------------------------------------------------
    // Filtering and search
    // -------------------------------------------------------------------------

    /// The filter state.
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Sets the filter on a filterable column.
    ///
    /// # Errors
    ///
    /// `InvalidColumnKey` for an unknown column, `InvalidConfig` for one that
    /// is not filterable.
    pub fn set_filter(&mut self, column: &str, filter: ColumnFilter) -> Result<()> {
        self.columns.require_capable(column, "filterable", |c| c.filterable)?;
        self.filters.set(column, filter);
        self.inputs_changed();
        Ok(())
    }

    /// Removes the filter on a column.
    pub fn clear_filter(&mut self, column: &str) -> bool {
        let removed = self.filters.remove(column).is_some();
        if removed {
            self.inputs_changed();
        }
        removed
    }

    /// Removes every column filter. The search is kept.
    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.inputs_changed();
    }

    /// Records search input now; it applies once typing pauses.
    pub fn search_input(&mut self, value: impl Into<String>) {
        self.search_input_at(value, Instant::now());
    }

    /// Records search input at `now`.
    pub fn search_input_at(&mut self, value: impl Into<String>, now: Instant) {
        self.search.input(value, now);
    }

    /// Applies pending search input whose quiet period has elapsed by
    /// `now`. Returns `true` if the search changed.
    pub fn poll_search(&mut self, now: Instant) -> bool {
        let commit = self.search.poll(now);
        self.commit_search(commit)
    }

    /// Waits for pending search input to settle and applies it. Returns
    /// `true` if the search changed.
    pub async fn settle_search(&mut self) -> bool {
        let commit = tokio::select! {
            _ = self.cancel.cancelled() => None,
            commit = self.search.settled() => commit,
        };
        self.commit_search(commit)
    }

    /// Sets the search value immediately, skipping the debounce.
    pub fn set_search(&mut self, value: impl Into<String>) -> bool {
        self.search.input(value, Instant::now());
        let commit = self.search.flush();
        self.commit_search(commit)
    }

    fn commit_search(&mut self, commit: Option<crate::search::SearchCommit>) -> bool {
        let Some(commit) = commit else {
            return false;
        };
        log::debug!("search #{} committed: {:?}", commit.sequence, commit.value);
        self.filters.search_mut().value = commit.value;
        self.inputs_changed();
        true
    }

    // -------------------------------------------------------------------------
    // Sorting
    // -------------------------------------------------------------------------

    /// The sort state.
    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    /// Cycles a column through ascending, descending and unsorted.
    ///
    /// In multi-sort mode the other keys are kept.
    pub fn toggle_sort(&mut self, column: &str) -> Result<()> {
        self.columns.require_capable(column, "sortable", |c| c.sortable)?;
        self.sort.toggle(column, self.config.multi_sort);
        self.inputs_changed();
        Ok(())
    }

    /// Replaces the sort keys.
    ///
    /// Keys beyond the sort limit (one when multi-sort is off) are dropped.
    pub fn set_sort(&mut self, mut keys: Vec<SortKey>) -> Result<()> {
        for key in &keys {
            self.columns.require_capable(&key.key, "sortable", |c| c.sortable)?;
        }
        if !self.config.multi_sort {
            keys.truncate(1);
        }
        self.sort.set(keys);
        self.inputs_changed();
        Ok(())
    }

    /// Removes every sort key.
    pub fn clear_sort(&mut self) {
        self.sort.clear();
        self.inputs_changed();
    }

    // -------------------------------------------------------------------------
    // Grouping
    // -------------------------------------------------------------------------

    /// The group state.
    pub fn group_state(&self) -> &GroupState {
        &self.groups
    }

    /// Groups by the given columns, outermost first. An empty list
    /// ungroups.
    pub fn set_group_by(&mut self, columns: Vec<String>) -> Result<()> {
        for key in &columns {
            self.columns.require_capable(key, "groupable", |c| c.groupable)?;
        }
        self.groups.set_keys(columns);
        self.paginator.reset();
        Ok(())
    }

    /// Collapses or expands a bucket. Returns `true` if it is now collapsed.
    pub fn toggle_group(&mut self, path: BucketPath) -> bool {
        self.groups.toggle_collapsed(path)
    }

    /// Orders buckets with `comparator` instead of first encounter.
    pub fn set_bucket_order(&mut self, comparator: Option<BucketComparator>) {
        self.groups.set_bucket_order(comparator);
    }

    // -------------------------------------------------------------------------
    // Pagination
    // -------------------------------------------------------------------------

    /// The pagination controller.
    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    /// Jumps to a page (offset pagination). Out-of-range indices clamp to
    /// the last page on the next refresh.
    pub fn set_page(&mut self, page_index: usize) -> Result<()> {
        match &mut self.paginator {
            Paginator::Offset(offset) => {
                offset.set_page(page_index);
                Ok(())
            }
            _ => Err(DataTableError::invalid_config(
                "jumping to a page needs offset pagination",
            )),
        }
    }

    /// Moves to the next page. Returns `false` at the last page.
    ///
    /// In cursor mode this moves to the held next cursor; follow up with
    /// [`fetch`](Self::fetch).
    pub fn next_page(&mut self) -> bool {
        let total = self.snapshot.display_total;
        match &mut self.paginator {
            Paginator::Offset(offset) => offset.next(total),
            Paginator::Cursor(cursor) => cursor.advance(),
            Paginator::None => false,
        }
    }

    /// Moves to the previous page. Returns `false` at the first page.
    pub fn prev_page(&mut self) -> bool {
        match &mut self.paginator {
            Paginator::Offset(offset) => offset.prev(),
            Paginator::Cursor(cursor) => cursor.retreat(),
            Paginator::None => false,
        }
    }

    /// Changes the page size (or cursor limit) and returns to the first
    /// page.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero size or an unpaginated table.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if page_size == 0 {
            return Err(DataTableError::invalid_config("page size must be at least 1")
                .with_context("field", "page_size"));
        }
        match &mut self.paginator {
            Paginator::Offset(offset) => offset.set_page_size(page_size),
            Paginator::Cursor(cursor) => cursor.set_limit(page_size),
            Paginator::None => {
                return Err(DataTableError::invalid_config("table is not paginated"));
            }
        }
        self.config.page_size = page_size;
        self.sequencer.invalidate();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Columns
    // -------------------------------------------------------------------------

    /// Hides a hideable column.
    pub fn hide_column(&mut self, column: &str) -> Result<()> {
        self.columns.set_hidden(column, true)
    }

    /// Shows a hidden column.
    pub fn show_column(&mut self, column: &str) -> Result<()> {
        self.columns.set_hidden(column, false)
    }

    /// Pins a pinnable column, or unpins it with [`Pin::None`].
    pub fn pin_column(&mut self, column: &str, pin: Pin) -> Result<()> {
        self.columns.set_pin(column, pin)
    }

    // -------------------------------------------------------------------------
    // Virtualization
    // -------------------------------------------------------------------------

    /// Attaches the host's scroll container. Keep the returned handle alive
    /// for as long as the container exists.
    pub fn attach_viewport(&self, height: f64) -> ViewportAttachment {
        self.viewport.attach(height)
    }

    /// Scrolls so that display row `index` of the current page is in view.
    /// Returns the new scroll offset, or `None` without a viewport or for
    /// an out-of-range index.
    pub fn scroll_to_index(&mut self, index: usize) -> Option<f64> {
        let viewport = self.viewport.current()?;
        let offset = self
            .windower
            .scroll_to_index(&self.snapshot.page_keys, index, viewport)?;
        self.viewport.set_scroll(offset);
        Some(offset)
    }

    /// Records a measured row height for the size cache.
    pub fn record_row_height(&mut self, row_id: RowId, height: f64) -> bool {
        self.windower.record_size(ItemKey::Row(row_id), height)
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// The selection.
    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    /// Applies a selection action against the filtered order of the last
    /// refresh.
    pub fn dispatch(&mut self, action: SelectionAction) -> Result<bool> {
        self.selection.dispatch(action, &self.snapshot.filtered_ids)
    }

    /// Ids a bulk action should target, in filtered order.
    pub fn bulk_targets(&self) -> Vec<RowId> {
        self.selection.bulk_targets(&self.snapshot.filtered_ids)
    }

    /// Number of selected rows.
    pub fn selected_count(&self) -> usize {
        let total = self.remote_total.unwrap_or(self.snapshot.filtered_ids.len());
        self.selection.count(total)
    }

    /// Asks the bound [`SelectAllResolver`] for every filtered id, so bulk
    /// actions can target rows that are not held locally. Returns the
    /// number of resolved ids.
    ///
    /// # Errors
    ///
    /// - `ContextMissing` without a resolver, or after teardown.
    /// - `SelectionFailed` when the resolver fails or the table is torn
    ///   down while it runs.
    pub async fn resolve_all_filtered(&mut self) -> Result<usize> {
        let resolver = self.require(self.collaborators.resolver.clone(), "select-all resolver")?;
        let result = tokio::select! {
            _ = self.cancel.cancelled() => Err("cancelled by teardown".into()),
            result = guard_async(resolver.resolve()) => result,
        };
        match result {
            Ok(ids) => {
                let n = ids.len();
                self.selection.apply_resolved(ids);
                Ok(n)
            }
            Err(cause) => {
                let error = DataTableError::new(
                    ErrorCode::SelectionFailed,
                    format!("resolving all filtered rows failed: {cause}"),
                )
                .with_cause(cause);
                self.report(std::slice::from_ref(&error));
                Err(error)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Token cancelled on teardown. Host work tied to this table can hang
    /// child tokens off it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns `true` after [`teardown`](Self::teardown).
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Cancels in-flight async work, detaches the viewport, closes edit
    /// sessions and unbinds collaborators. Also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.cancel.cancel();
        self.viewport.detach();
        self.search.cancel();
        let edits = self.edits.cancel_all();
        self.collaborators = Collaborators::default();
        self.sequencer.invalidate();
        log::debug!("table torn down ({edits} open edits cancelled)");
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Filter, search or sort inputs changed: back to the first page, and
    /// in-flight fetches for the old inputs are stale.
    fn inputs_changed(&mut self) {
        self.paginator.reset();
        self.sequencer.invalidate();
    }

    fn require<T>(&self, collaborator: Option<T>, name: &str) -> Result<T> {
        if self.torn_down {
            return Err(DataTableError::context_missing(name)
                .with_context("reason", "table was torn down"));
        }
        collaborator.ok_or_else(|| DataTableError::context_missing(name))
    }

    fn report(&self, errors: &[DataTableError]) {
        if let Some(sink) = &self.sink {
            for error in errors {
                sink.report(error);
            }
        }
    }
}

impl Drop for DataTable {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.viewport.detach();
    }
}

impl std::fmt::Debug for DataTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTable")
            .field("config", &self.config)
            .field("columns", &self.columns.len())
            .field("rows", &self.rows.len())
            .field("filters", &self.filters)
            .field("sort", &self.sort)
            .field("groups", &self.groups)
            .field("paginator", &self.paginator)
            .field("selection", &self.selection)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

/// Builds the id index, rejecting duplicates.
fn index_rows(rows: &[Row]) -> Result<HashMap<RowId, usize>> {
    let mut index = HashMap::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if index.insert(row.id().clone(), i).is_some() {
            return Err(DataTableError::duplicate_row_id(row.id().as_str()).with_context("index", i));
        }
    }
    Ok(index)
}

/// Ids present in `ids`, for membership checks.
fn id_set(ids: &[RowId]) -> HashSet<&RowId> {
    ids.iter().collect()
}
