//! Value enum for dynamic cell values

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

/// A dynamic value held by a row field or produced by a column accessor.
///
/// # Type Mapping
///
/// | JSON | Rust Variant |
/// |------|--------------|
/// | null | `Null` |
/// | boolean | `Bool` |
/// | integral number | `Int` |
/// | other number | `Float` |
/// | string | `String` |
/// | array | `List` |
/// | object | `Object` |
///
/// `Decimal` and `DateTime` never come out of JSON directly; hosts build them
/// from typed data or accessors.
///
/// # Example
///
/// ```
/// use tabula_lib::model::Value;
///
/// let name = Value::from("Contoso");
/// let amount = Value::from(-50i64);
/// let active = Value::from(true);
/// let empty = Value::Null;
/// assert_eq!(amount.as_f64(), Some(-50.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null/empty value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// Arbitrary precision decimal.
    Decimal(Decimal),
    /// String value.
    String(String),
    /// Date and time with timezone.
    DateTime(DateTime<Utc>),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested object, addressable by dot paths.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for the numeric variants.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(v) => v.to_f64(),
            _ => None,
        }
    }

    /// Exact decimal view of integer and decimal values.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(v) => Some(Decimal::from(*v)),
            Value::Decimal(v) => Some(*v),
            Value::Float(v) => Decimal::from_f64(*v),
            _ => None,
        }
    }

    /// String slice, for string values only.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean, for boolean values only.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Date-time view of the value.
    ///
    /// Strings are accepted in RFC 3339 form or as a bare `YYYY-MM-DD` date
    /// (taken as midnight UTC).
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::String(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// Returns the list elements, for list values only.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the nested object, for object values only.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Plain-text rendering used for search, text filters and export
    /// fallbacks. Null renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Decimal(v) => v.normalize().to_string(),
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Object(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Canonical key used to bucket equal values together when grouping.
    ///
    /// Numerically equal values share a key regardless of representation,
    /// so `Int(2)` and `Float(2.0)` land in the same bucket.
    pub(crate) fn bucket_key(&self) -> String {
        match self {
            Value::Null => "n:".to_string(),
            Value::Bool(b) => format!("b:{b}"),
            Value::Int(_) | Value::Float(_) | Value::Decimal(_) => match self.as_decimal() {
                Some(d) => format!("d:{}", d.normalize()),
                None => format!("f:{}", self.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => format!("s:{s}"),
            Value::DateTime(dt) => format!("t:{}", dt.timestamp_micros()),
            Value::List(_) | Value::Object(_) => format!("j:{}", self.to_text()),
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

// =============================================================================
// From implementations
// =============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from(serde_json::json!(3)), Value::Int(3));
        assert_eq!(Value::from(serde_json::json!(2.5)), Value::Float(2.5));
    }

    #[test]
    fn test_from_json_nested() {
        let v = Value::from(serde_json::json!({"a": {"b": [1, "x"]}}));
        let inner = v.as_object().unwrap().get("a").unwrap();
        assert_eq!(
            inner.as_object().unwrap().get("b"),
            Some(&Value::List(vec![Value::Int(1), Value::from("x")]))
        );
    }

    #[test]
    fn test_datetime_parsing() {
        let v = Value::from("2024-03-01");
        let dt = v.as_datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(Value::from("not a date").as_datetime().is_none());
        assert!(Value::from("2024-03-01T10:00:00Z").as_datetime().is_some());
    }

    #[test]
    fn test_bucket_key_unifies_numeric_representations() {
        assert_eq!(Value::Int(2).bucket_key(), Value::Float(2.0).bucket_key());
        assert_ne!(Value::Int(2).bucket_key(), Value::from("2").bucket_key());
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::from(vec![Value::Int(1), Value::Int(2)]).to_text(), "1, 2");
        assert_eq!(Value::Decimal(Decimal::new(1500, 2)).to_text(), "15");
    }
}
