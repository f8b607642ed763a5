//! Default value comparator.

use std::cmp::Ordering;

use crate::model::Value;

/// Compares two values by their runtime type.
///
/// Numbers compare numerically across `Int`, `Float` and `Decimal`.
/// Strings compare case-insensitively first and fall back to a raw
/// comparison so the order stays total. Booleans order `false` before
/// `true`. Values of different kinds are ordered by a fixed rank, with
/// `Null` greater than everything else.
///
/// Direction and null placement are applied by the sort engine, not here.
///
/// ```
/// use std::cmp::Ordering;
/// use tabula_lib::model::Value;
/// use tabula_lib::sort::compare_values;
///
/// assert_eq!(compare_values(&Value::Int(2), &Value::Float(10.5)), Ordering::Less);
/// assert_eq!(compare_values(&Value::from("apple"), &Value::from("Banana")), Ordering::Less);
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (x, y) if x.is_numeric() && y.is_numeric() => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => compare_strings(x, y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_text().cmp(&b.to_text()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    // Exact where both sides have a decimal form; NaN and infinities do not.
    match (a.as_decimal(), b.as_decimal()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
    }
}

fn compare_strings(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => 1,
        Value::DateTime(_) => 2,
        Value::String(_) => 3,
        Value::List(_) => 4,
        Value::Object(_) => 5,
        Value::Null => 6,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_numeric_across_representations() {
        assert_eq!(compare_values(&Value::Int(2), &Value::Float(2.0)), Ordering::Equal);
        assert_eq!(
            compare_values(&Value::Decimal(Decimal::new(150, 2)), &Value::Int(1)),
            Ordering::Greater
        );
        assert_eq!(compare_values(&Value::Int(-50), &Value::Int(100)), Ordering::Less);
    }

    #[test]
    fn test_strings_case_folded_with_tiebreak() {
        assert_eq!(compare_values(&"b".into(), &"A".into()), Ordering::Greater);
        assert_ne!(compare_values(&"a".into(), &"A".into()), Ordering::Equal);
    }

    #[test]
    fn test_mixed_types_use_rank() {
        assert_eq!(compare_values(&Value::Int(1), &"1".into()), Ordering::Less);
        assert_eq!(compare_values(&Value::Null, &Value::Bool(false)), Ordering::Greater);
    }

    #[test]
    fn test_nan_is_ordered() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(compare_values(&nan, &nan), Ordering::Equal);
        assert_ne!(compare_values(&nan, &Value::Int(1)), Ordering::Equal);
    }
}
