//! Filter state: per-column filters and full-text search.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::error::CallbackResult;
use crate::model::Row;
use crate::model::Value;

/// Custom filter predicate, called with the row and the filter's value.
///
/// Return `Err` for rows the predicate cannot judge. A panic is caught and
/// handled like an error, but the process panic hook still runs for every
/// row it happens on.
pub type FilterFn = Arc<dyn Fn(&Row, &Value) -> CallbackResult<bool> + Send + Sync>;

/// A filter on one column.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tabula_lib::error::CallbackResult;
/// use tabula_lib::filter::ColumnFilter;
/// use tabula_lib::model::{Row, Value};
///
/// let text = ColumnFilter::text("con");
/// let positive = ColumnFilter::number_range(Some(0.0), None);
/// let status = ColumnFilter::multi_select(["open", "pending"]);
/// let even = ColumnFilter::custom(
///     Arc::new(|row: &Row, _: &Value| -> CallbackResult<bool> {
///         Ok(row.get("amt").and_then(Value::as_f64).is_some_and(|v| v % 2.0 == 0.0))
///     }),
///     Value::Null,
/// );
/// ```
#[derive(Clone)]
pub enum ColumnFilter {
    /// Case-insensitive substring of the value's text.
    Text(String),
    /// Equality with one value.
    Select(Value),
    /// Membership in a set of values.
    MultiSelect(Vec<Value>),
    /// Inclusive numeric bounds; a missing bound is unbounded.
    NumberRange {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
    /// Inclusive date-time bounds; a missing bound is unbounded.
    DateRange {
        /// Earliest accepted instant.
        from: Option<DateTime<Utc>>,
        /// Latest accepted instant.
        to: Option<DateTime<Utc>>,
    },
    /// Host predicate.
    Custom {
        /// The predicate.
        predicate: FilterFn,
        /// Value handed to the predicate.
        value: Value,
    },
}

impl ColumnFilter {
    /// Creates a text filter.
    pub fn text(needle: impl Into<String>) -> Self {
        ColumnFilter::Text(needle.into())
    }

    /// Creates a select filter.
    pub fn select(value: impl Into<Value>) -> Self {
        ColumnFilter::Select(value.into())
    }

    /// Creates a multi-select filter.
    pub fn multi_select<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        ColumnFilter::MultiSelect(values.into_iter().map(Into::into).collect())
    }

    /// Creates a number-range filter.
    pub fn number_range(min: Option<f64>, max: Option<f64>) -> Self {
        ColumnFilter::NumberRange { min, max }
    }

    /// Creates a date-range filter.
    pub fn date_range(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        ColumnFilter::DateRange { from, to }
    }

    /// Creates a custom filter.
    pub fn custom(predicate: FilterFn, value: impl Into<Value>) -> Self {
        ColumnFilter::Custom {
            predicate,
            value: value.into(),
        }
    }

    /// Returns `false` for filters that accept everything: blank text, a
    /// null selection, an empty set or a range with no bounds.
    pub fn is_active(&self) -> bool {
        match self {
            ColumnFilter::Text(needle) => !needle.trim().is_empty(),
            ColumnFilter::Select(value) => !value.is_null(),
            ColumnFilter::MultiSelect(values) => !values.is_empty(),
            ColumnFilter::NumberRange { min, max } => min.is_some() || max.is_some(),
            ColumnFilter::DateRange { from, to } => from.is_some() || to.is_some(),
            ColumnFilter::Custom { .. } => true,
        }
    }

    /// Tests a resolved cell `value` of `row`.
    ///
    /// Only custom predicates can fail.
    pub(crate) fn matches(&self, row: &Row, value: &Value) -> CallbackResult<bool> {
        Ok(match self {
            ColumnFilter::Text(needle) => {
                let needle = needle.trim().to_lowercase();
                value.to_text().to_lowercase().contains(&needle)
            }
            ColumnFilter::Select(target) => any_member(value, |v| same(v, target)),
            ColumnFilter::MultiSelect(targets) => {
                any_member(value, |v| targets.iter().any(|t| same(v, t)))
            }
            ColumnFilter::NumberRange { min, max } => match number(value) {
                Some(n) => min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi),
                None => false,
            },
            ColumnFilter::DateRange { from, to } => match value.as_datetime() {
                Some(dt) => from.is_none_or(|lo| dt >= lo) && to.is_none_or(|hi| dt <= hi),
                None => false,
            },
            ColumnFilter::Custom { predicate, value: arg } => return predicate(row, arg),
        })
    }
}

/// A list value matches when any element does.
fn any_member(value: &Value, test: impl Fn(&Value) -> bool) -> bool {
    match value {
        Value::List(items) => items.iter().any(test),
        _ => test(value),
    }
}

fn same(a: &Value, b: &Value) -> bool {
    a.bucket_key() == b.bucket_key()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => value.as_f64(),
    }
    .filter(|n| !n.is_nan())
}

impl std::fmt::Debug for ColumnFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnFilter::Text(needle) => f.debug_tuple("Text").field(needle).finish(),
            ColumnFilter::Select(value) => f.debug_tuple("Select").field(value).finish(),
            ColumnFilter::MultiSelect(values) => f.debug_tuple("MultiSelect").field(values).finish(),
            ColumnFilter::NumberRange { min, max } => f
                .debug_struct("NumberRange")
                .field("min", min)
                .field("max", max)
                .finish(),
            ColumnFilter::DateRange { from, to } => f
                .debug_struct("DateRange")
                .field("from", from)
                .field("to", to)
                .finish(),
            ColumnFilter::Custom { value, .. } => f
                .debug_struct("Custom")
                .field("value", value)
                .finish_non_exhaustive(),
        }
    }
}

/// How the search value is matched against cell text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Case-insensitive substring.
    #[default]
    Substring,
    /// Fuzzy subsequence match.
    Fuzzy,
}

/// Full-text search across a set of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// The committed search value. Blank means no search.
    pub value: String,
    /// Columns searched; `None` means every filterable column.
    pub columns: Option<Vec<String>>,
    /// Matching mode.
    pub mode: SearchMode,
}

impl SearchState {
    /// Returns `true` if the search restricts rows.
    pub fn is_active(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// Column filters plus the search predicate. Rows must pass all of them.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    filters: BTreeMap<String, ColumnFilter>,
    search: SearchState,
}

impl FilterState {
    /// Creates an empty filter state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter on `key`, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, filter: ColumnFilter) {
        self.filters.insert(key.into(), filter);
    }

    /// Removes the filter on `key`.
    pub fn remove(&mut self, key: &str) -> Option<ColumnFilter> {
        self.filters.remove(key)
    }

    /// Removes every column filter. The search is kept.
    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// The filter on `key`.
    pub fn get(&self, key: &str) -> Option<&ColumnFilter> {
        self.filters.get(key)
    }

    /// All column filters, active or not.
    pub fn filters(&self) -> &BTreeMap<String, ColumnFilter> {
        &self.filters
    }

    /// Active column filters.
    pub fn active(&self) -> impl Iterator<Item = (&String, &ColumnFilter)> {
        self.filters.iter().filter(|(_, f)| f.is_active())
    }

    /// Returns `true` if any filter or the search restricts rows.
    pub fn is_active(&self) -> bool {
        self.active().next().is_some() || self.search.is_active()
    }

    /// The search state.
    pub fn search(&self) -> &SearchState {
        &self.search
    }

    /// Mutable search state.
    pub fn search_mut(&mut self) -> &mut SearchState {
        &mut self.search
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn row() -> Row {
        Row::new("1")
    }

    #[test]
    fn test_text_is_case_insensitive() {
        let filter = ColumnFilter::text("CON");
        assert!(filter.matches(&row(), &"Contoso".into()).unwrap());
        assert!(!filter.matches(&row(), &"Fabrikam".into()).unwrap());
    }

    #[test]
    fn test_select_and_multi_select() {
        assert!(ColumnFilter::select(2i64).matches(&row(), &Value::Float(2.0)).unwrap());
        let multi = ColumnFilter::multi_select(["a", "b"]);
        assert!(multi.matches(&row(), &"b".into()).unwrap());
        assert!(!multi.matches(&row(), &"c".into()).unwrap());
        let tags = Value::List(vec!["x".into(), "a".into()]);
        assert!(multi.matches(&row(), &tags).unwrap());
    }

    #[test]
    fn test_number_range_inclusive_and_open() {
        let filter = ColumnFilter::number_range(Some(0.0), Some(100.0));
        assert!(filter.matches(&row(), &Value::Int(100)).unwrap());
        assert!(filter.matches(&row(), &Value::Int(0)).unwrap());
        assert!(!filter.matches(&row(), &Value::Int(-50)).unwrap());
        assert!(!filter.matches(&row(), &Value::Null).unwrap());

        let open = ColumnFilter::number_range(None, Some(10.0));
        assert!(open.matches(&row(), &Value::Int(-1_000)).unwrap());
        assert!(open.matches(&row(), &"7.5".into()).unwrap());
    }

    #[test]
    fn test_date_range() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let filter = ColumnFilter::date_range(Some(from), None);
        assert!(filter.matches(&row(), &"2024-01-01".into()).unwrap());
        assert!(!filter.matches(&row(), &"2023-12-31".into()).unwrap());
        assert!(!filter.matches(&row(), &"soon".into()).unwrap());
    }

    #[test]
    fn test_inactive_filters() {
        assert!(!ColumnFilter::text("  ").is_active());
        assert!(!ColumnFilter::select(Value::Null).is_active());
        assert!(!ColumnFilter::number_range(None, None).is_active());
        let mut state = FilterState::new();
        state.set("a", ColumnFilter::text(""));
        assert!(!state.is_active());
        state.search_mut().value = "x".into();
        assert!(state.is_active());
    }
}
