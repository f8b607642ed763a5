//! The row pipeline and its output.

use std::collections::BTreeMap;

use serde::Serialize;

use super::DataTable;
use super::id_set;
use crate::column::Column;
use crate::column::Rendered;
use crate::column::Renderer;
use crate::column::display_text;
use crate::column::render_with;
use crate::config::DataMode;
use crate::error::DataTableError;
use crate::error::Result;
use crate::export::ExportCell;
use crate::export::ExportScope;
use crate::export::export_rows;
use crate::filter::filter_rows;
use crate::group::Bucket;
use crate::group::BucketPath;
use crate::group::Entry;
use crate::group::build_groups;
use crate::group::flatten;
use crate::model::Row;
use crate::model::RowId;
use crate::model::Value;
use crate::pagination::PageInfo;
use crate::pagination::Paginator;
use crate::recovery::Incidents;
use crate::sort::sort_rows;
use crate::virtualization::ItemKey;
use crate::virtualization::VirtualWindow;

/// Summary line of a group bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupHeader {
    /// Bucket path from the outermost level.
    pub path: BucketPath,
    /// Column grouped on.
    pub column: String,
    /// Shared key value.
    pub value: Value,
    /// Nesting depth, starting at 0.
    pub depth: usize,
    /// Member row count.
    pub count: usize,
    /// Aggregates per aggregating column.
    pub aggregates: BTreeMap<String, Value>,
    /// Whether the bucket's members are hidden.
    pub collapsed: bool,
}

/// One line of the display sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayRow {
    /// A group header.
    Group(GroupHeader),
    /// A data row.
    Leaf {
        /// Row id.
        id: RowId,
        /// Nesting depth (0 when ungrouped).
        depth: usize,
    },
}

impl DisplayRow {
    /// The row id of a leaf.
    pub fn row_id(&self) -> Option<&RowId> {
        match self {
            DisplayRow::Leaf { id, .. } => Some(id),
            DisplayRow::Group(_) => None,
        }
    }
}

/// A rendered cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayCell {
    /// Column key.
    pub column: String,
    /// Value shown: the pending value while the cell is being edited.
    pub value: Value,
    /// Display text.
    pub text: String,
    /// Whether an edit session is open on the cell.
    pub editing: bool,
}

/// A display row inside the virtualization window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializedRow {
    /// Index into [`TableView::rows`].
    pub index: usize,
    /// The display row.
    pub row: DisplayRow,
    /// Whether the row is selected. Always `false` for group headers.
    pub selected: bool,
    /// Cells of the visible columns, in presentation order. Empty for
    /// group headers.
    pub cells: Vec<DisplayCell>,
}

/// Output of one pipeline pass.
#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    /// Display rows of the current page.
    pub rows: Vec<DisplayRow>,
    /// The rows of `rows` inside the virtualization window, rendered.
    pub materialized: Vec<MaterializedRow>,
    /// Every row passing the filters, in sorted order.
    pub filtered_ids: Vec<RowId>,
    /// Rows matching the filters: the filtered count locally, the
    /// source-reported total (or the page length) remotely.
    pub total_rows: usize,
    /// Pagination summary.
    pub page: PageInfo,
    /// Virtualization window over `rows`.
    pub window: VirtualWindow,
    /// Group tree, empty when ungrouped.
    pub groups: Vec<Bucket>,
    /// Visible column keys in presentation order.
    pub visible_columns: Vec<String>,
    /// Errors recovered during the pass, one per code.
    #[serde(skip)]
    pub errors: Vec<DataTableError>,
}

impl DataTable {
    /// Runs the pipeline: filter, sort, group, paginate, window.
    ///
    /// Recovered callback failures are reported to the error sink once per
    /// code and listed in [`TableView::errors`]. In remote mode the held
    /// page is already filtered and sorted by the source, so only grouping
    /// and windowing run locally.
    ///
    /// # Errors
    ///
    /// The first error whose recovery strategy chose `Abort`. It is
    /// reported to the sink as well.
    pub fn refresh(&mut self) -> Result<TableView> {
        let mut incidents = Incidents::new(&self.registry, "refresh");

        let order: Vec<usize> = match self.config.mode {
            DataMode::Local => {
                let mut order = filter_rows(&self.rows, &self.filters, &self.columns, &mut incidents);
                sort_rows(&self.rows, &mut order, &self.sort, &self.columns, &mut incidents);
                order
            }
            DataMode::Remote => (0..self.rows.len()).collect(),
        };
        let filtered_ids: Vec<RowId> = order.iter().map(|&i| self.rows[i].id().clone()).collect();

        let in_view = id_set(&filtered_ids);
        let cancelled = self.edits.cancel_where(|id| in_view.contains(id));

        let groups = if self.groups.is_active() {
            build_groups(&self.rows, &order, &self.groups, &self.columns, &mut incidents)
        } else {
            Vec::new()
        };
        let mut entries = Vec::with_capacity(order.len());
        if groups.is_empty() {
            entries.extend(order.iter().map(|&index| Entry::Leaf { index, depth: 0 }));
        } else {
            flatten(&groups, &self.groups, &mut entries);
        }

        let display_total = entries.len();
        let total_rows = match self.config.mode {
            DataMode::Local => order.len(),
            DataMode::Remote => self.remote_total.unwrap_or(self.rows.len()),
        };
        let (range, page) = match &mut self.paginator {
            Paginator::Offset(offset) => {
                let range = offset.range(display_total);
                (range, offset.info(display_total))
            }
            Paginator::Cursor(cursor) => (0..display_total, cursor.info(self.remote_total)),
            Paginator::None => (
                0..display_total,
                PageInfo {
                    page_count: Some(usize::from(display_total > 0)),
                    total_rows: Some(total_rows),
                    ..Default::default()
                },
            ),
        };
        let page_entries = &entries[range];

        let items: Vec<(ItemKey, Option<&Row>)> = page_entries
            .iter()
            .map(|entry| match entry {
                Entry::Group(bucket) => (ItemKey::Group(bucket.path.clone()), None),
                Entry::Leaf { index, .. } => {
                    let row = &self.rows[*index];
                    (ItemKey::Row(row.id().clone()), Some(row))
                }
            })
            .collect();
        let window = self.windower.compute(
            &items,
            self.viewport.current(),
            self.collaborators.measure.as_deref(),
            &mut incidents,
        );

        let rows: Vec<DisplayRow> = page_entries.iter().map(|e| self.display_row(e)).collect();
        let visible = self.columns.visible_columns();
        let materialized: Vec<MaterializedRow> = window
            .range
            .clone()
            .map(|i| {
                let cells = match page_entries[i] {
                    Entry::Leaf { index, .. } => self.cells(&self.rows[index], &visible, &mut incidents),
                    Entry::Group(_) => Vec::new(),
                };
                MaterializedRow {
                    index: i,
                    selected: rows[i].row_id().is_some_and(|id| self.selection.is_selected(id)),
                    row: rows[i].clone(),
                    cells,
                }
            })
            .collect();
        let visible_columns: Vec<String> = visible.iter().map(|c| c.key.clone()).collect();
        let page_rows: Vec<usize> = page_entries
            .iter()
            .filter_map(|e| match e {
                Entry::Leaf { index, .. } => Some(*index),
                Entry::Group(_) => None,
            })
            .collect();
        let page_keys: Vec<ItemKey> = items.into_iter().map(|(key, _)| key).collect();

        let aborted = incidents.aborted();
        let errors = incidents.finish();
        self.report(&errors);

        log::debug!(
            "refresh: {} of {} rows pass, {} display rows on page, window {:?}{}",
            order.len(),
            self.rows.len(),
            rows.len(),
            window.range,
            if cancelled.is_empty() {
                String::new()
            } else {
                format!(", {} edits cancelled", cancelled.len())
            }
        );

        self.snapshot.order = order;
        self.snapshot.filtered_ids = filtered_ids.clone();
        self.snapshot.page_rows = page_rows;
        self.snapshot.page_keys = page_keys;
        self.snapshot.display_total = display_total;

        if let Some(error) = aborted {
            return Err(error);
        }
        Ok(TableView {
            rows,
            materialized,
            filtered_ids,
            total_rows,
            page,
            window,
            groups,
            visible_columns,
            errors,
        })
    }

    fn display_row(&self, entry: &Entry<'_>) -> DisplayRow {
        match entry {
            Entry::Group(bucket) => DisplayRow::Group(GroupHeader {
                path: bucket.path.clone(),
                column: bucket.column.clone(),
                value: bucket.value.clone(),
                depth: bucket.depth,
                count: bucket.count(),
                aggregates: bucket.aggregates.clone(),
                collapsed: self.groups.is_collapsed(&bucket.path),
            }),
            Entry::Leaf { index, depth } => DisplayRow::Leaf {
                id: self.rows[*index].id().clone(),
                depth: *depth,
            },
        }
    }

    fn cells(&self, row: &Row, visible: &[&Column], incidents: &mut Incidents<'_>) -> Vec<DisplayCell> {
        visible
            .iter()
            .map(|column| match self.edits.session(row.id(), &column.key) {
                Some(session) => DisplayCell {
                    column: column.key.clone(),
                    text: session.pending_value.to_text(),
                    value: session.pending_value.clone(),
                    editing: true,
                },
                None => DisplayCell {
                    column: column.key.clone(),
                    value: column.resolve(row),
                    text: display_text(column, row, incidents),
                    editing: false,
                },
            })
            .collect()
    }

    /// Display text of a cell, through the column renderer. A failing
    /// renderer falls back to plain text and is reported to the sink.
    pub fn display_value(&self, row_id: &RowId, column: &str) -> Option<String> {
        let column = self.columns.get(column)?;
        let row = self.row(row_id)?;
        let mut incidents = Incidents::new(&self.registry, "render");
        let text = display_text(column, row, &mut incidents);
        self.report(&incidents.finish());
        Some(text)
    }

    /// Renders a cell with a host renderer producing any presentation type,
    /// with the same recovery as the built-in display text.
    pub fn render_cell<T>(
        &self,
        row_id: &RowId,
        column: &str,
        renderer: &dyn Renderer<T>,
    ) -> Option<Rendered<T>> {
        let column = self.columns.get(column)?;
        let row = self.row(row_id)?;
        let value = column.resolve(row);
        let mut incidents = Incidents::new(&self.registry, "render");
        let rendered = render_with(renderer, column, row, &value, &mut incidents);
        self.report(&incidents.finish());
        Some(rendered)
    }

    /// Produces the export stream for `scope`, as of the last refresh.
    ///
    /// # Errors
    ///
    /// `ExportFailed` when a print value strategy fails; nothing is
    /// produced in that case. The error is reported to the sink as well.
    pub fn export(&self, scope: ExportScope) -> Result<Vec<ExportCell>> {
        let indices: Vec<usize> = match scope {
            ExportScope::Filtered => self.snapshot.order.clone(),
            ExportScope::CurrentPage => self.snapshot.page_rows.clone(),
            ExportScope::Selected => self
                .bulk_targets()
                .iter()
                .filter_map(|id| self.row_index.get(id).copied())
                .collect(),
        };
        let mut incidents = Incidents::new(&self.registry, "export");
        let result = export_rows(indices.iter().map(|&i| &self.rows[i]), &self.columns, &mut incidents);
        let mut errors = incidents.finish();
        if let Err(error) = &result {
            errors.push(error.clone());
        }
        self.report(&errors);
        result
    }
}
