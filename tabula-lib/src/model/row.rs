//! Rows and row identity

use std::collections::BTreeMap;

use serde::Serialize;

use super::Value;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;

/// Stable identity of a row.
///
/// Selection, editing and the virtualization size cache are all keyed by
/// `RowId`, never by position or object identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    /// Creates a row id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Int(i) => Some(Self(i.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for RowId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

impl From<i64> for RowId {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl From<i32> for RowId {
    fn from(v: i32) -> Self {
        Self(v.to_string())
    }
}

/// A single record in the table.
///
/// Fields are held as a map of [`Value`]s; nested objects are reachable
/// through dot paths (`"address.city"`).
///
/// # Example
///
/// ```
/// use tabula_lib::model::{Row, Value};
///
/// let row = Row::new(1)
///     .set("amt", -50i64)
///     .set("customer", Value::from(serde_json::json!({"name": "Ada"})));
///
/// assert_eq!(row.id().as_str(), "1");
/// assert_eq!(row.get_path("customer.name"), Some(&Value::from("Ada")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    id: RowId,
    fields: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row with the given id.
    pub fn new(id: impl Into<RowId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builds a row from a JSON object. The `id` field is mandatory and must
    /// be a non-empty string or an integer.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(DataTableError::new(
                ErrorCode::InvalidDataFormat,
                "row must be a JSON object",
            ));
        };
        let fields: BTreeMap<String, Value> =
            map.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
        let id = fields
            .get("id")
            .and_then(RowId::from_value)
            .ok_or_else(|| DataTableError::new(ErrorCode::MissingRowId, "row has no usable 'id' field"))?;
        Ok(Self { id, fields })
    }

    /// Builds rows from a JSON array of objects.
    pub fn from_json_array(value: serde_json::Value) -> Result<Vec<Self>> {
        let serde_json::Value::Array(items) = value else {
            return Err(DataTableError::new(
                ErrorCode::InvalidDataFormat,
                "rows must be a JSON array",
            ));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                Self::from_json(item).map_err(|e| match e.code {
                    ErrorCode::MissingRowId => DataTableError::missing_row_id(index),
                    _ => e.with_context("index", index),
                })
            })
            .collect()
    }

    /// Returns the row id.
    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// Sets a top-level field (builder style).
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Returns a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns all top-level fields.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Resolves a dot path against the row's fields.
    ///
    /// Returns `None` if any segment is missing or traverses a non-object.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Writes a value at a dot path, creating intermediate objects.
    ///
    /// An intermediate segment holding a non-object value is replaced by an
    /// object.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut map = &mut self.fields;
        for segment in parents {
            let entry = map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(BTreeMap::new()));
            if !matches!(entry, Value::Object(_)) {
                *entry = Value::Object(BTreeMap::new());
            }
            let Value::Object(inner) = entry else {
                return;
            };
            map = inner;
        }
        map.insert((*last).to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_with_integer_id() {
        let row = Row::from_json(serde_json::json!({"id": 1, "amt": -50})).unwrap();
        assert_eq!(row.id(), &RowId::from(1));
        assert_eq!(row.get("amt"), Some(&Value::Int(-50)));
    }

    #[test]
    fn test_from_json_missing_id() {
        let err = Row::from_json(serde_json::json!({"amt": 3})).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRowId);
        let err = Row::from_json(serde_json::json!({"id": null})).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRowId);
    }

    #[test]
    fn test_from_json_array_reports_index() {
        let err = Row::from_json_array(serde_json::json!([{"id": 1}, {"name": "x"}])).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRowId);
        assert_eq!(err.context_value("index"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        let err = Row::from_json(serde_json::json!([1, 2])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDataFormat);
    }

    #[test]
    fn test_get_path() {
        let row = Row::from_json(serde_json::json!({
            "id": "a",
            "customer": {"address": {"city": "Ghent"}},
            "tags": ["x"]
        }))
        .unwrap();
        assert_eq!(row.get_path("customer.address.city"), Some(&Value::from("Ghent")));
        assert_eq!(row.get_path("customer.missing"), None);
        assert_eq!(row.get_path("tags.0"), None);
    }

    #[test]
    fn test_set_path_creates_objects() {
        let mut row = Row::new("r").set("flat", 1i64);
        row.set_path("a.b", Value::from("deep"));
        row.set_path("flat.inner", Value::Int(2));
        assert_eq!(row.get_path("a.b"), Some(&Value::from("deep")));
        assert_eq!(row.get_path("flat.inner"), Some(&Value::Int(2)));
    }
}
