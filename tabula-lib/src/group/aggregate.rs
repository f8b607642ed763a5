//! Per-bucket aggregation reducers.

use std::cmp::Ordering;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::CallbackResult;
use crate::model::Value;
use crate::sort::compare_values;

/// Custom aggregation over the resolved values of a bucket's members.
pub type AggregateFn = Arc<dyn Fn(&[Value]) -> CallbackResult<Value> + Send + Sync>;

/// Aggregation reducer declared on a column.
///
/// Built-in reducers skip `Null` members, except `Count`, which counts
/// every member of the bucket.
///
/// | Reducer | Result |
/// |---------|--------|
/// | `Sum` | `Int` when every member is an integer and the sum fits, `Decimal` when no member is a float, `Float` otherwise |
/// | `Average` | `Decimal` when some member is a decimal and none is a float, `Float` otherwise; `Null` for no members |
/// | `Count` | `Int` |
/// | `Min`, `Max` | a member value, by the default comparator |
#[derive(Clone)]
pub enum Aggregation {
    /// Sum of numeric values.
    Sum,
    /// Arithmetic mean of numeric values.
    Average,
    /// Number of members.
    Count,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Host-supplied reducer.
    Custom(AggregateFn),
}

impl std::fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Sum => f.write_str("Sum"),
            Aggregation::Average => f.write_str("Average"),
            Aggregation::Count => f.write_str("Count"),
            Aggregation::Min => f.write_str("Min"),
            Aggregation::Max => f.write_str("Max"),
            Aggregation::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Aggregation {
    /// Creates a custom aggregation.
    pub fn custom(f: impl Fn(&[Value]) -> CallbackResult<Value> + Send + Sync + 'static) -> Self {
        Aggregation::Custom(Arc::new(f))
    }

    /// Reduces `values`, one per bucket member.
    ///
    /// Fails when a built-in numeric reducer meets a non-numeric value or
    /// when a custom reducer fails.
    pub fn apply(&self, values: &[Value]) -> CallbackResult<Value> {
        match self {
            Aggregation::Count => Ok(Value::from(values.len())),
            Aggregation::Sum => sum(values),
            Aggregation::Average => average(values),
            Aggregation::Min => Ok(extreme(values, Ordering::Less)),
            Aggregation::Max => Ok(extreme(values, Ordering::Greater)),
            Aggregation::Custom(f) => f(values),
        }
    }
}

fn numeric(values: &[Value]) -> CallbackResult<Vec<&Value>> {
    values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| {
            if v.is_numeric() {
                Ok(v)
            } else {
                Err(format!("cannot aggregate non-numeric {} value", v.type_name()).into())
            }
        })
        .collect()
}

fn sum(values: &[Value]) -> CallbackResult<Value> {
    let members = numeric(values)?;
    if members.iter().any(|v| matches!(v, Value::Float(_))) {
        return Ok(Value::Float(members.iter().filter_map(|v| v.as_f64()).sum()));
    }

    let mut int_sum: Option<i64> = Some(0);
    let mut decimal_sum = Decimal::ZERO;
    let mut all_int = true;
    for value in &members {
        if let Value::Int(i) = value {
            int_sum = int_sum.and_then(|s| s.checked_add(*i));
        } else {
            all_int = false;
        }
        let d = value.as_decimal().ok_or("value has no decimal form")?;
        decimal_sum = decimal_sum
            .checked_add(d)
            .ok_or("decimal overflow while summing")?;
    }
    Ok(match int_sum {
        Some(total) if all_int => Value::Int(total),
        _ => Value::Decimal(decimal_sum.normalize()),
    })
}

fn average(values: &[Value]) -> CallbackResult<Value> {
    let members = numeric(values)?;
    if members.is_empty() {
        return Ok(Value::Null);
    }
    let has_decimal = members.iter().any(|v| matches!(v, Value::Decimal(_)));
    let has_float = members.iter().any(|v| matches!(v, Value::Float(_)));
    if has_decimal && !has_float {
        if let Value::Decimal(total) = sum(values)? {
            let count = Decimal::from(members.len());
            return Ok(Value::Decimal((total / count).normalize()));
        }
    }
    let total: f64 = members.iter().filter_map(|v| v.as_f64()).sum();
    Ok(Value::Float(total / members.len() as f64))
}

fn extreme(values: &[Value], keep: Ordering) -> Value {
    values
        .iter()
        .filter(|v| !v.is_null())
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if compare_values(v, b) != keep => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&v| Value::Int(v)).collect()
    }

    #[test]
    fn test_sum_of_ints_stays_int() {
        assert_eq!(Aggregation::Sum.apply(&ints(&[100, 100])).unwrap(), Value::Int(200));
        assert_eq!(Aggregation::Sum.apply(&[]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_sum_overflow_promotes_to_decimal() {
        let result = Aggregation::Sum.apply(&ints(&[i64::MAX, 1])).unwrap();
        assert_eq!(
            result,
            Value::Decimal(Decimal::from(i64::MAX) + Decimal::ONE)
        );
    }

    #[test]
    fn test_sum_with_float_is_float() {
        let values = vec![Value::Int(1), Value::Float(0.5), Value::Null];
        assert_eq!(Aggregation::Sum.apply(&values).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_sum_rejects_strings() {
        assert!(Aggregation::Sum.apply(&[Value::from("x")]).is_err());
    }

    #[test]
    fn test_count_counts_nulls() {
        let values = vec![Value::Null, Value::Int(1)];
        assert_eq!(Aggregation::Count.apply(&values).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_average() {
        assert_eq!(Aggregation::Average.apply(&ints(&[1, 2])).unwrap(), Value::Float(1.5));
        assert_eq!(Aggregation::Average.apply(&[Value::Null]).unwrap(), Value::Null);
        let decimals = vec![Value::Decimal(Decimal::new(10, 1)), Value::Int(2)];
        assert_eq!(
            Aggregation::Average.apply(&decimals).unwrap(),
            Value::Decimal(Decimal::new(15, 1))
        );
    }

    #[test]
    fn test_min_max() {
        let values = vec![Value::Int(3), Value::Null, Value::Int(-1), Value::Int(7)];
        assert_eq!(Aggregation::Min.apply(&values).unwrap(), Value::Int(-1));
        assert_eq!(Aggregation::Max.apply(&values).unwrap(), Value::Int(7));
        assert_eq!(Aggregation::Max.apply(&[Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn test_custom() {
        let distinct = Aggregation::custom(|values| {
            let mut seen: Vec<&Value> = Vec::new();
            for v in values {
                if !seen.contains(&v) {
                    seen.push(v);
                }
            }
            Ok(Value::from(seen.len()))
        });
        assert_eq!(distinct.apply(&ints(&[1, 1, 2])).unwrap(), Value::Int(2));
    }
}
