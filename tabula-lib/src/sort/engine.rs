//! Stable multi-key sort over row indices.

use std::cmp::Ordering;

use super::Direction;
use super::SortState;
use super::compare_values;
use crate::column::ColumnModel;
use crate::column::SortFn;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::guard;
use crate::model::Row;
use crate::model::Value;
use crate::recovery::Fallback;
use crate::recovery::Incidents;

/// Stable merge sort.
///
/// `slice::sort_by` may panic when the comparator is not a total order, and
/// host comparators (plus the "equal" fallback for failing ones) give no
/// such guarantee. This sort only ever asks "is the right element strictly
/// smaller", so any comparator terminates and equal elements keep their
/// relative order.
pub(crate) fn merge_sort_by<T: Copy>(items: &mut [T], mut cmp: impl FnMut(&T, &T) -> Ordering) {
    let len = items.len();
    if len < 2 {
        return;
    }
    let mut buf: Vec<T> = items.to_vec();
    let mut width = 1;
    let mut src_is_items = true;
    while width < len {
        {
            let (src, dst): (&[T], &mut [T]) = if src_is_items {
                (&*items, &mut buf[..])
            } else {
                (&buf[..], &mut *items)
            };
            let mut start = 0;
            while start < len {
                let mid = (start + width).min(len);
                let end = (start + 2 * width).min(len);
                let (mut i, mut j, mut k) = (start, mid, start);
                while i < mid && j < end {
                    if cmp(&src[j], &src[i]) == Ordering::Less {
                        dst[k] = src[j];
                        j += 1;
                    } else {
                        dst[k] = src[i];
                        i += 1;
                    }
                    k += 1;
                }
                dst[k..k + (mid - i)].copy_from_slice(&src[i..mid]);
                k += mid - i;
                dst[k..k + (end - j)].copy_from_slice(&src[j..end]);
                start = end;
            }
        }
        src_is_items = !src_is_items;
        width *= 2;
    }
    if !src_is_items {
        items.copy_from_slice(&buf);
    }
}

enum KeyPlan {
    Default { values: Vec<Value>, direction: Direction },
    Custom { key: String, sort_fn: SortFn, direction: Direction },
}

/// Sorts `order` (indices into `rows`) by `state`.
///
/// Resolved values are computed once per key and row. Keys naming unknown
/// or non-sortable columns are ignored. Comparator failures go through the
/// SORT_ERROR strategy; any fallback other than a usable ordering makes the
/// pair compare equal.
pub(crate) fn sort_rows(
    rows: &[Row],
    order: &mut [usize],
    state: &SortState,
    columns: &ColumnModel,
    incidents: &mut Incidents<'_>,
) {
    if state.is_empty() || order.len() < 2 {
        return;
    }

    let plans: Vec<KeyPlan> = state
        .keys()
        .iter()
        .filter_map(|key| {
            let column = columns.get(&key.key).filter(|c| c.sortable)?;
            Some(match &column.sort_fn {
                Some(sort_fn) => KeyPlan::Custom {
                    key: key.key.clone(),
                    sort_fn: sort_fn.clone(),
                    direction: key.direction,
                },
                None => {
                    // Indexed by row index so lookups survive the reordering.
                    let mut values = vec![Value::Null; rows.len()];
                    for &i in order.iter() {
                        values[i] = column.resolve(&rows[i]);
                    }
                    KeyPlan::Default {
                        values,
                        direction: key.direction,
                    }
                }
            })
        })
        .collect();
    if plans.is_empty() {
        return;
    }

    merge_sort_by(order, |&a, &b| {
        for plan in &plans {
            let ord = match plan {
                KeyPlan::Default { values, direction } => {
                    compare_nulls_last(&values[a], &values[b], *direction)
                }
                KeyPlan::Custom {
                    key,
                    sort_fn,
                    direction,
                } => {
                    let ord = custom_compare(key, sort_fn, &rows[a], &rows[b], incidents);
                    apply_direction(ord, *direction)
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn compare_nulls_last(a: &Value, b: &Value, direction: Direction) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => apply_direction(compare_values(a, b), direction),
    }
}

fn apply_direction(ord: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

fn custom_compare(
    key: &str,
    sort_fn: &SortFn,
    a: &Row,
    b: &Row,
    incidents: &mut Incidents<'_>,
) -> Ordering {
    match guard(|| sort_fn(a, b)) {
        Ok(ord) => ord,
        Err(cause) => {
            let error = DataTableError::new(
                ErrorCode::SortFailed,
                format!("comparator for column '{key}' failed: {cause}"),
            )
            .with_context("column", key)
            .with_context("left_row_id", a.id().as_str())
            .with_context("right_row_id", b.id().as_str())
            .with_cause(cause);
            // Only Equal is meaningful mid-sort; other fallbacks degrade to it.
            let _ = incidents.handle(error, Fallback::Equal);
            Ordering::Equal
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::column::Column;
    use crate::error::CallbackResult;
    use crate::recovery::RecoveryRegistry;
    use crate::sort::SortKey;

    fn rows() -> Vec<Row> {
        Row::from_json_array(serde_json::json!([
            {"id": 1, "amt": -50, "name": "b"},
            {"id": 2, "amt": 100, "name": "a"},
            {"id": 3, "amt": 100, "name": null},
            {"id": 4, "amt": null, "name": "c"},
        ]))
        .unwrap()
    }

    fn ids(rows: &[Row], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| rows[i].id().to_string()).collect()
    }

    fn run(state: &SortState, columns: Vec<Column>) -> (Vec<String>, Vec<DataTableError>) {
        let rows = rows();
        let model = ColumnModel::new(columns, None).unwrap();
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "sort");
        let mut order: Vec<usize> = (0..rows.len()).collect();
        sort_rows(&rows, &mut order, state, &model, &mut incidents);
        (ids(&rows, &order), incidents.finish())
    }

    #[test]
    fn test_merge_sort_is_stable() {
        let mut items = vec![(3, 'a'), (1, 'b'), (3, 'c'), (2, 'd'), (1, 'e')];
        merge_sort_by(&mut items, |a, b| a.0.cmp(&b.0));
        assert_eq!(items, vec![(1, 'b'), (1, 'e'), (2, 'd'), (3, 'a'), (3, 'c')]);
    }

    #[test]
    fn test_merge_sort_survives_inconsistent_comparator() {
        let mut items: Vec<u32> = (0..37).collect();
        let mut flip = false;
        merge_sort_by(&mut items, |_, _| {
            flip = !flip;
            if flip { Ordering::Less } else { Ordering::Greater }
        });
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn test_multi_key_sort() {
        let mut state = SortState::default();
        state.set(vec![SortKey::asc("amt"), SortKey::desc("id")]);
        let (order, errors) = run(&state, vec![Column::new("amt"), Column::new("id")]);
        assert_eq!(order, vec!["1", "3", "2", "4"]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_nulls_last_in_both_directions() {
        let mut state = SortState::default();
        state.set(vec![SortKey::desc("amt")]);
        let (order, _) = run(&state, vec![Column::new("amt")]);
        assert_eq!(order.last().map(String::as_str), Some("4"));

        state.set(vec![SortKey::asc("name")]);
        let (order, _) = run(&state, vec![Column::new("name")]);
        assert_eq!(order, vec!["2", "1", "4", "3"]);
    }

    #[test]
    fn test_failing_comparator_treated_as_equal() {
        let failing: SortFn =
            Arc::new(|_: &Row, _: &Row| -> CallbackResult<Ordering> { Err("no comparing today".into()) });
        let mut state = SortState::default();
        state.set(vec![SortKey::asc("amt")]);
        let (order, errors) = run(&state, vec![Column::new("amt").sort_fn(failing)]);
        assert_eq!(order, vec!["1", "2", "3", "4"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::SortFailed);
    }

    #[test]
    fn test_unsortable_columns_ignored() {
        let mut state = SortState::default();
        state.set(vec![SortKey::desc("id")]);
        let (order, _) = run(&state, vec![Column::new("id").sortable(false)]);
        assert_eq!(order, vec!["1", "2", "3", "4"]);
    }
}
