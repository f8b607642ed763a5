//! Host-supplied rendering strategies.

use super::Column;
use crate::error::CallbackResult;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::guard;
use crate::model::Row;
use crate::model::Value;
use crate::recovery::Fallback;
use crate::recovery::Incidents;

/// Turns a cell into some presentation type `T`.
///
/// The engine itself only uses `Renderer<String>` (display text and print
/// values); hosts can implement it for their own node types and run it
/// through [`DataTable::render_cell`](crate::table::DataTable::render_cell) to
/// get the same error recovery.
///
/// Closures implement this trait directly:
///
/// ```
/// use std::sync::Arc;
/// use tabula_lib::column::Column;
/// use tabula_lib::error::CallbackResult;
/// use tabula_lib::model::{Row, Value};
///
/// let money = |_row: &Row, value: &Value| -> CallbackResult<String> { Ok(format!("${value}")) };
/// let column = Column::new("amt").renderer(Arc::new(money));
/// ```
pub trait Renderer<T>: Send + Sync {
    /// Renders the resolved `value` of a cell in `row`.
    fn render(&self, row: &Row, value: &Value) -> CallbackResult<T>;
}

impl<T, F> Renderer<T> for F
where
    F: Fn(&Row, &Value) -> CallbackResult<T> + Send + Sync,
{
    fn render(&self, row: &Row, value: &Value) -> CallbackResult<T> {
        self(row, value)
    }
}

/// Result of rendering a cell through a host renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered<T> {
    /// The renderer's output.
    Custom(T),
    /// The renderer failed; the plain text of the value is shown instead.
    PlainText(String),
}

impl Rendered<String> {
    /// The rendered text, whichever way it was produced.
    pub fn into_text(self) -> String {
        match self {
            Rendered::Custom(text) | Rendered::PlainText(text) => text,
        }
    }
}

/// Runs `renderer` on a cell, falling back through RENDER_ERROR recovery.
pub(crate) fn render_with<T>(
    renderer: &dyn Renderer<T>,
    column: &Column,
    row: &Row,
    value: &Value,
    incidents: &mut Incidents<'_>,
) -> Rendered<T> {
    match guard(|| renderer.render(row, value)) {
        Ok(out) => Rendered::Custom(out),
        Err(cause) => {
            let error = DataTableError::new(
                ErrorCode::RenderFailed,
                format!("rendering {}/{} failed: {cause}", row.id(), column.key),
            )
            .with_context("row_id", row.id().as_str())
            .with_context("column", column.key.as_str())
            .with_cause(cause);
            match incidents.handle(error, Fallback::PlainText) {
                Fallback::Value(v) => Rendered::PlainText(v.to_text()),
                _ => Rendered::PlainText(value.to_text()),
            }
        }
    }
}

/// Display text of a cell: the column renderer's output, or the value's
/// plain text when there is no renderer or it failed.
pub(crate) fn display_text(column: &Column, row: &Row, incidents: &mut Incidents<'_>) -> String {
    let value = column.resolve(row);
    match &column.renderer {
        Some(renderer) => render_with(renderer.as_ref(), column, row, &value, incidents).into_text(),
        None => value.to_text(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::recovery::RecoveryRegistry;

    #[test]
    fn test_display_text_uses_renderer() {
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "render");
        let column = Column::new("amt").renderer(Arc::new(|_: &Row, v: &Value| -> CallbackResult<String> {
            Ok(format!("${v}"))
        }));
        let row = Row::new("1").set("amt", 5i64);
        assert_eq!(display_text(&column, &row, &mut incidents), "$5");
        assert!(incidents.is_empty());
    }

    #[test]
    fn test_failing_renderer_falls_back_to_plain_text() {
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "render");
        let column = Column::new("amt").renderer(Arc::new(|_: &Row, _: &Value| -> CallbackResult<String> {
            Err("no template".into())
        }));
        let rows = [Row::new("1").set("amt", 5i64), Row::new("2").set("amt", 6i64)];
        let texts: Vec<String> = rows.iter().map(|r| display_text(&column, r, &mut incidents)).collect();
        assert_eq!(texts, vec!["5", "6"]);

        let errors = incidents.finish();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::RenderFailed);
        assert_eq!(errors[0].context_value("occurrences"), Some(&serde_json::json!(2)));
    }
}
