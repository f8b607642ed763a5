//! Composite filter evaluation.

use super::FilterState;
use super::SearchMatcher;
use crate::column::Column;
use crate::column::ColumnModel;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::guard;
use crate::model::Row;
use crate::model::Value;
use crate::recovery::Fallback;
use crate::recovery::Incidents;

/// Returns the indices of rows passing every active column filter and the
/// search, in dataset order.
///
/// Filters on unknown or non-filterable columns are ignored. A failing
/// custom predicate goes through the FILTER_ERROR strategy; the default
/// lets the row pass.
pub(crate) fn filter_rows(
    rows: &[Row],
    state: &FilterState,
    columns: &ColumnModel,
    incidents: &mut Incidents<'_>,
) -> Vec<usize> {
    let active: Vec<(&Column, &super::ColumnFilter)> = state
        .active()
        .filter_map(|(key, filter)| {
            columns
                .get(key)
                .filter(|c| c.filterable)
                .map(|c| (c, filter))
        })
        .collect();

    let search = state.search();
    let searched: Vec<&Column> = if search.is_active() {
        columns.searchable(search.columns.as_deref())
    } else {
        Vec::new()
    };
    let mut matcher = search
        .is_active()
        .then(|| SearchMatcher::new(&search.value, search.mode));

    (0..rows.len())
        .filter(|&i| {
            let row = &rows[i];
            let passes_filters = active.iter().all(|(column, filter)| {
                let value = column.resolve(row);
                match guard(|| filter.matches(row, &value)) {
                    Ok(pass) => pass,
                    Err(cause) => {
                        let error = DataTableError::new(
                            ErrorCode::FilterFailed,
                            format!("filter on column '{}' failed: {cause}", column.key),
                        )
                        .with_context("column", column.key.as_str())
                        .with_context("row_id", row.id().as_str())
                        .with_cause(cause);
                        match incidents.handle(error, Fallback::Include) {
                            Fallback::Exclude => false,
                            Fallback::Value(Value::Bool(pass)) => pass,
                            _ => true,
                        }
                    }
                }
            });
            passes_filters
                && matcher.as_mut().is_none_or(|m| {
                    searched
                        .iter()
                        .any(|column| m.is_match(&column.resolve(row).to_text()))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::CallbackResult;
    use crate::filter::ColumnFilter;
    use crate::filter::SearchMode;
    use crate::recovery::RecoveryRegistry;
    use crate::recovery::RecoveryStrategy;

    fn rows() -> Vec<Row> {
        Row::from_json_array(serde_json::json!([
            {"id": 1, "amt": -50, "name": "Contoso"},
            {"id": 2, "amt": 100, "name": "Fabrikam"},
            {"id": 3, "amt": 100, "name": "Northwind"},
        ]))
        .unwrap()
    }

    fn model() -> ColumnModel {
        ColumnModel::new(vec![Column::new("id"), Column::new("amt"), Column::new("name")], None)
            .unwrap()
    }

    fn run(state: &FilterState, registry: &RecoveryRegistry) -> (Vec<usize>, Vec<DataTableError>) {
        let mut incidents = Incidents::new(registry, "filter");
        let out = filter_rows(&rows(), state, &model(), &mut incidents);
        (out, incidents.finish())
    }

    fn failing_for_row_one() -> ColumnFilter {
        ColumnFilter::custom(
            Arc::new(|row: &Row, _: &Value| -> CallbackResult<bool> {
                if row.id().as_str() == "1" {
                    panic!("predicate blew up");
                }
                Ok(false)
            }),
            Value::Null,
        )
    }

    #[test]
    fn test_positive_amounts() {
        let mut state = FilterState::new();
        state.set("amt", ColumnFilter::number_range(Some(0.0), None));
        let (out, errors) = run(&state, &RecoveryRegistry::default());
        assert_eq!(out, vec![1, 2]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_failing_predicate_fails_open_once() {
        let mut state = FilterState::new();
        state.set("amt", failing_for_row_one());
        let (out, errors) = run(&state, &RecoveryRegistry::default());
        assert_eq!(out, vec![0]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::FilterFailed);
    }

    #[test]
    fn test_fail_closed_override() {
        let registry = RecoveryRegistry::default()
            .with_strategy(ErrorCode::FilterFailed, RecoveryStrategy::new(Fallback::Exclude));
        let mut state = FilterState::new();
        state.set("amt", failing_for_row_one());
        let (out, _) = run(&state, &registry);
        assert!(out.is_empty());
    }

    #[test]
    fn test_search_across_columns() {
        let mut state = FilterState::new();
        state.search_mut().value = "wind".into();
        let (out, _) = run(&state, &RecoveryRegistry::default());
        assert_eq!(out, vec![2]);

        state.search_mut().columns = Some(vec!["amt".into()]);
        let (out, _) = run(&state, &RecoveryRegistry::default());
        assert!(out.is_empty());

        state.search_mut().columns = None;
        state.search_mut().mode = SearchMode::Fuzzy;
        state.search_mut().value = "fbrk".into();
        let (out, _) = run(&state, &RecoveryRegistry::default());
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn test_idempotent() {
        let mut state = FilterState::new();
        state.set("name", ColumnFilter::text("o"));
        let rows = rows();
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "filter");
        let once = filter_rows(&rows, &state, &model(), &mut incidents);
        let subset: Vec<Row> = once.iter().map(|&i| rows[i].clone()).collect();
        let twice = filter_rows(&subset, &state, &model(), &mut incidents);
        assert_eq!(twice.len(), once.len());
    }
}
