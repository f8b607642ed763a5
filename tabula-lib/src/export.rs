//! Export stream: ordered print values for a set of rows.

use serde::Deserialize;
use serde::Serialize;

use crate::column::ColumnModel;
use crate::column::display_text;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::error::guard;
use crate::model::Row;
use crate::model::RowId;
use crate::recovery::Incidents;

/// Which rows an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportScope {
    /// Every row that passes the filters, in sorted order.
    #[default]
    Filtered,
    /// The rows of the current page.
    CurrentPage,
    /// The selected rows that pass the filters, in sorted order.
    Selected,
}

/// One exported cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportCell {
    /// Row the cell belongs to.
    pub row_id: RowId,
    /// Column the cell belongs to.
    pub column_key: String,
    /// Text to write out.
    pub print_value: String,
}

/// Produces the cells of `rows` for every visible column, row by row.
///
/// A column's `print_value` strategy wins over its display text. A failing
/// print strategy fails the whole export; failing display renderers fall
/// back to plain text like they do on screen.
pub(crate) fn export_rows<'r>(
    rows: impl IntoIterator<Item = &'r Row>,
    columns: &ColumnModel,
    incidents: &mut Incidents<'_>,
) -> Result<Vec<ExportCell>> {
    let visible = columns.visible_columns();
    let mut cells = Vec::new();
    for row in rows {
        for column in &visible {
            let print_value = match &column.print_value {
                Some(print) => {
                    let value = column.resolve(row);
                    guard(|| print.render(row, &value)).map_err(|cause| {
                        DataTableError::new(
                            ErrorCode::ExportFailed,
                            format!("print value for {}/{} failed: {cause}", row.id(), column.key),
                        )
                        .with_context("row_id", row.id().as_str())
                        .with_context("column", column.key.as_str())
                        .with_cause(cause)
                    })?
                }
                None => display_text(column, row, incidents),
            };
            cells.push(ExportCell {
                row_id: row.id().clone(),
                column_key: column.key.clone(),
                print_value,
            });
        }
    }
    log::debug!("exported {} cells over {} columns", cells.len(), visible.len());
    Ok(cells)
}
