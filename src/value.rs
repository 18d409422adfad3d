//! Loose JSON coercions used by rule predicates and error messages.
//!
//! Payloads arrive as `serde_json::Value`; rules compare them the way a
//! dynamically typed test harness would (truthiness, string form, numeric
//! form), so those conversions live here in one place.
use serde_json::Value;

/// `false` for null, `false`, zero, NaN-ish numbers and the empty string.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Number formatting that drops a trailing `.0` on integral floats.
pub fn number_string(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// String form of a value: strings verbatim, arrays comma-joined, objects opaque.
pub fn to_display(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_string(n),
        Value::String(s) => s.clone(),
        Value::Array(xs) => xs
            .iter()
            .map(|x| match x {
                Value::Null => String::new(),
                other => to_display(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Numeric form of a value; `None` when it has none (compares false either way).
pub fn to_number(v: &Value) -> Option<f64> {
    match v {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                Some(0.0)
            } else {
                t.parse::<f64>().ok().filter(|f| !f.is_nan())
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Identity-style equality: numbers by value, containers never equal.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(_), _) | (Value::Object(_), _) => false,
        _ => a == b,
    }
}

/// Length of the string form, counted in UTF-16 code units.
pub fn display_len(v: &Value) -> usize {
    match v {
        Value::String(s) => s.encode_utf16().count(),
        other => to_display(other).encode_utf16().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_matches_loose_semantics() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn display_forms() {
        assert_eq!(to_display(&json!(5.0)), "5");
        assert_eq!(to_display(&json!(2.5)), "2.5");
        assert_eq!(to_display(&json!(["a", 1, null])), "a,1,");
        assert_eq!(to_display(&json!({"a": 1})), "[object Object]");
    }

    #[test]
    fn large_integral_floats_render_in_full() {
        assert_eq!(to_display(&json!(1e20)), "100000000000000000000");
        assert_eq!(to_display(&json!(-9.5e18)), "-9500000000000000000");
        assert_eq!(to_display(&json!(3.0)), "3");
        assert_eq!(to_display(&json!(2.5)), "2.5");
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(to_number(&json!(" 42 ")), Some(42.0));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!(true)), Some(1.0));
        assert_eq!(to_number(&json!([1])), None);
    }

    #[test]
    fn strict_equality() {
        assert!(strict_eq(&json!(1), &json!(1.0)));
        assert!(!strict_eq(&json!("1"), &json!(1)));
        assert!(!strict_eq(&json!([1]), &json!([1])));
    }

    #[test]
    fn length_is_utf16_based() {
        assert_eq!(display_len(&json!("héllo")), 5);
        assert_eq!(display_len(&json!("😀")), 2);
        assert_eq!(display_len(&json!(12345)), 5);
    }
}
