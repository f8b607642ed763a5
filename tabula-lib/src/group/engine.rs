//! Hierarchical bucketing and aggregation.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;

use super::BucketPath;
use super::GroupState;
use crate::column::Column;
use crate::column::ColumnModel;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::guard;
use crate::model::Row;
use crate::model::RowId;
use crate::model::Value;
use crate::recovery::Fallback;
use crate::recovery::Incidents;
use crate::sort::merge_sort_by;

/// One node of the group tree.
#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    /// Column grouped on at this level.
    pub column: String,
    /// Resolved key value shared by every member.
    pub value: Value,
    /// Path from the outermost level down to this bucket.
    pub path: BucketPath,
    /// Nesting depth, starting at 0.
    pub depth: usize,
    /// Member row ids in sorted order.
    pub rows: Vec<RowId>,
    /// Aggregate per aggregating column.
    pub aggregates: BTreeMap<String, Value>,
    /// Sub-buckets for the next grouping level.
    pub children: Vec<Bucket>,
    #[serde(skip)]
    pub(crate) members: Vec<usize>,
}

impl Bucket {
    /// Number of member rows.
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Finds the descendant (or self) at `path`.
    pub fn find(&self, path: &[String]) -> Option<&Bucket> {
        if path == self.path.as_slice() {
            return Some(self);
        }
        self.children
            .iter()
            .find(|c| path.starts_with(&c.path))
            .and_then(|c| c.find(path))
    }
}

/// Builds the bucket tree over `order` (sorted indices into `rows`).
///
/// Grouping keys naming unknown or non-groupable columns are skipped.
pub(crate) fn build_groups(
    rows: &[Row],
    order: &[usize],
    state: &GroupState,
    columns: &ColumnModel,
    incidents: &mut Incidents<'_>,
) -> Vec<Bucket> {
    let levels: Vec<&Column> = state
        .keys()
        .iter()
        .filter_map(|k| columns.get(k).filter(|c| c.groupable))
        .collect();
    let aggregating: Vec<&Column> = columns
        .columns()
        .iter()
        .filter(|c| c.aggregation.is_some())
        .collect();
    let ctx = BuildContext {
        rows,
        levels: &levels,
        aggregating: &aggregating,
        state,
    };
    ctx.build_level(order, 0, &[], incidents)
}

struct BuildContext<'a> {
    rows: &'a [Row],
    levels: &'a [&'a Column],
    aggregating: &'a [&'a Column],
    state: &'a GroupState,
}

impl BuildContext<'_> {
    fn build_level(
        &self,
        members: &[usize],
        depth: usize,
        parent: &[String],
        incidents: &mut Incidents<'_>,
    ) -> Vec<Bucket> {
        let Some(column) = self.levels.get(depth) else {
            return Vec::new();
        };

        // First-encounter order; members keep their sorted order.
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut partitions: Vec<(String, Value, Vec<usize>)> = Vec::new();
        for &i in members {
            let value = column.resolve(&self.rows[i]);
            let key = value.bucket_key();
            match slots.get(&key) {
                Some(&slot) => partitions[slot].2.push(i),
                None => {
                    slots.insert(key.clone(), partitions.len());
                    partitions.push((key, value, vec![i]));
                }
            }
        }

        if let Some(comparator) = self.state.bucket_order() {
            let mut indices: Vec<usize> = (0..partitions.len()).collect();
            merge_sort_by(&mut indices, |&a, &b| {
                match guard(|| comparator(&partitions[a].1, &partitions[b].1)) {
                    Ok(ord) => ord,
                    Err(cause) => {
                        let error = DataTableError::new(
                            ErrorCode::SortFailed,
                            format!("bucket comparator for '{}' failed: {cause}", column.key),
                        )
                        .with_context("column", column.key.as_str())
                        .with_cause(cause);
                        let _ = incidents.handle(error, Fallback::Equal);
                        std::cmp::Ordering::Equal
                    }
                }
            });
            let mut taken: Vec<Option<(String, Value, Vec<usize>)>> =
                partitions.into_iter().map(Some).collect();
            partitions = indices.into_iter().filter_map(|i| taken[i].take()).collect();
        }

        partitions
            .into_iter()
            .map(|(key, value, members)| {
                let mut path = parent.to_vec();
                path.push(key);
                let aggregates = self.aggregate(&members, &path, incidents);
                let children = self.build_level(&members, depth + 1, &path, incidents);
                Bucket {
                    column: column.key.clone(),
                    value,
                    depth,
                    rows: members.iter().map(|&i| self.rows[i].id().clone()).collect(),
                    aggregates,
                    children,
                    members,
                    path,
                }
            })
            .collect()
    }

    fn aggregate(
        &self,
        members: &[usize],
        path: &[String],
        incidents: &mut Incidents<'_>,
    ) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for column in self.aggregating {
            let Some(aggregation) = &column.aggregation else {
                continue;
            };
            let values: Vec<Value> = members.iter().map(|&i| column.resolve(&self.rows[i])).collect();
            let value = match guard(|| aggregation.apply(&values)) {
                Ok(value) => value,
                Err(cause) => {
                    let error = DataTableError::new(
                        ErrorCode::AggregationFailed,
                        format!("aggregation of '{}' failed: {cause}", column.key),
                    )
                    .with_context("column", column.key.as_str())
                    .with_context("bucket", path.join("/"))
                    .with_cause(cause);
                    match incidents.handle(error, Fallback::Value(Value::Null)) {
                        Fallback::Value(value) => value,
                        _ => Value::Null,
                    }
                }
            };
            out.insert(column.key.clone(), value);
        }
        out
    }
}

/// One line of the flattened group tree.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Entry<'a> {
    /// A bucket header.
    Group(&'a Bucket),
    /// A data row, by index into the dataset.
    Leaf { index: usize, depth: usize },
}

/// Flattens buckets depth-first: each header followed by its children, or
/// by its member rows at the innermost level. Collapsed buckets contribute
/// only their header.
pub(crate) fn flatten<'a>(buckets: &'a [Bucket], state: &GroupState, out: &mut Vec<Entry<'a>>) {
    for bucket in buckets {
        out.push(Entry::Group(bucket));
        if state.is_collapsed(&bucket.path) {
            continue;
        }
        if bucket.children.is_empty() {
            out.extend(bucket.members.iter().map(|&index| Entry::Leaf {
                index,
                depth: bucket.depth + 1,
            }));
        } else {
            flatten(&bucket.children, state, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::CallbackResult;
    use crate::group::Aggregation;
    use crate::recovery::RecoveryRegistry;

    fn rows() -> Vec<Row> {
        Row::from_json_array(serde_json::json!([
            {"id": 1, "amt": -50, "region": "eu"},
            {"id": 2, "amt": 100, "region": "us"},
            {"id": 3, "amt": 100, "region": "eu"},
        ]))
        .unwrap()
    }

    fn sign_column() -> Column {
        Column::new("sign").accessor(Arc::new(|row: &Row| {
            let negative = row.get("amt").and_then(Value::as_f64).is_some_and(|v| v < 0.0);
            Value::from(if negative { "neg" } else { "pos" })
        }))
    }

    fn group(keys: &[&str], columns: Vec<Column>) -> (Vec<Bucket>, Vec<DataTableError>) {
        let rows = rows();
        let model = ColumnModel::new(columns, None).unwrap();
        let mut state = GroupState::new();
        state.set_keys(keys.iter().map(|k| k.to_string()).collect());
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "group");
        let buckets = build_groups(&rows, &[0, 1, 2], &state, &model, &mut incidents);
        (buckets, incidents.finish())
    }

    #[test]
    fn test_group_by_sign_with_sum() {
        let (buckets, errors) = group(
            &["sign"],
            vec![sign_column(), Column::new("amt").aggregate(Aggregation::Sum)],
        );
        assert!(errors.is_empty());
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].value, Value::from("neg"));
        assert_eq!(buckets[0].aggregates["amt"], Value::Int(-50));
        assert_eq!(buckets[1].value, Value::from("pos"));
        assert_eq!(buckets[1].aggregates["amt"], Value::Int(200));
        assert_eq!(buckets[1].count(), 2);
    }

    #[test]
    fn test_nested_levels_keep_member_order() {
        let (buckets, _) = group(&["region", "sign"], vec![Column::new("region"), sign_column()]);
        let eu = &buckets[0];
        assert_eq!(eu.rows, vec![RowId::from(1), RowId::from(3)]);
        assert_eq!(eu.children.len(), 2);
        assert_eq!(eu.children[1].depth, 1);
        assert_eq!(eu.find(&eu.children[1].path).map(|b| b.count()), Some(1));
    }

    #[test]
    fn test_failing_aggregation_falls_back_to_null() {
        let failing =
            Aggregation::custom(|_: &[Value]| -> CallbackResult<Value> { Err("nope".into()) });
        let (buckets, errors) = group(&["region"], vec![Column::new("region"), Column::new("amt").aggregate(failing)]);
        assert!(buckets.iter().all(|b| b.aggregates["amt"] == Value::Null));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::AggregationFailed);
    }

    #[test]
    fn test_flatten_respects_collapsed() {
        let rows = rows();
        let model = ColumnModel::new(vec![Column::new("region")], None).unwrap();
        let mut state = GroupState::new();
        state.set_keys(vec!["region".into()]);
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "group");
        let buckets = build_groups(&rows, &[0, 1, 2], &state, &model, &mut incidents);

        let mut entries = Vec::new();
        flatten(&buckets, &state, &mut entries);
        assert_eq!(entries.len(), 5);

        state.set_collapsed(buckets[0].path.clone(), true);
        let mut entries = Vec::new();
        flatten(&buckets, &state, &mut entries);
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[1], Entry::Group(b) if b.value == Value::from("us")));
    }

    #[test]
    fn test_bucket_comparator_orders_siblings() {
        let rows = rows();
        let model = ColumnModel::new(vec![Column::new("region")], None).unwrap();
        let mut state = GroupState::new();
        state.set_keys(vec!["region".into()]);
        state.set_bucket_order(Some(Arc::new(|a: &Value, b: &Value| -> CallbackResult<std::cmp::Ordering> {
            Ok(b.to_text().cmp(&a.to_text()))
        })));
        let registry = RecoveryRegistry::default();
        let mut incidents = Incidents::new(&registry, "group");
        let buckets = build_groups(&rows, &[0, 1, 2], &state, &model, &mut incidents);
        assert_eq!(buckets[0].value, Value::from("us"));
    }
}
