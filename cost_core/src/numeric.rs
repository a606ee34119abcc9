//! # Numeric and Merge Utilities
//!
//! The few primitives the normalization layer is built on:
//!
//! - [`coerce_finite_or`] - the single fallback rule for every numeric field
//! - [`to_number`] - loose number reading (JSON numbers and numeric strings)
//! - [`deep_merge`] - recursive object merge where candidate leaves win
//! - [`round_half_up`] - whole-unit rounding used by the delimited export
//!
//! ## Example
//!
//! ```rust
//! use cost_core::numeric::coerce_finite_or;
//! use serde_json::json;
//!
//! assert_eq!(coerce_finite_or(&json!(1200), 1000.0), 1200.0);
//! assert_eq!(coerce_finite_or(&json!(" 85.5 "), 1000.0), 85.5);
//! assert_eq!(coerce_finite_or(&json!("abc"), 1000.0), 1000.0);
//! assert_eq!(coerce_finite_or(&json!(null), 1000.0), 1000.0);
//! ```

use serde_json::Value;

/// Read a JSON value as a number.
///
/// Accepts JSON numbers, booleans (0/1) and strings that parse as a decimal
/// number after trimming (the empty string reads as 0). Everything else,
/// including `null`, arrays and objects, yields `None`.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

/// Coerce a JSON value to a finite number, or return `default`.
///
/// Non-numeric input and non-finite results (`"inf"`, `"NaN"`, overflowing
/// literals) both fall back to `default`; the result is never NaN or infinite
/// as long as `default` is finite.
pub fn coerce_finite_or(value: &Value, default: f64) -> f64 {
    match to_number(value) {
        Some(v) if v.is_finite() => v,
        _ => default,
    }
}

/// Same rule as [`coerce_finite_or`] for values that may be absent.
pub fn coerce_opt_finite_or(value: Option<&Value>, default: f64) -> f64 {
    value.map_or(default, |v| coerce_finite_or(v, default))
}

/// Recursively merge `src` onto `dst`.
///
/// For every key of `src`: when both sides hold objects the merge recurses,
/// otherwise the `src` value replaces the `dst` value verbatim (wrong-typed
/// values included). Keys only present in `src` are appended after the
/// existing ones. A non-object `src` leaves `dst` untouched.
pub fn deep_merge(dst: &mut Value, src: &Value) {
    let (Value::Object(dst_map), Value::Object(src_map)) = (dst, src) else {
        return;
    };
    for (key, src_value) in src_map {
        let recurse = src_value.is_object() && dst_map.get(key).is_some_and(Value::is_object);
        if recurse {
            if let Some(dst_value) = dst_map.get_mut(key) {
                deep_merge(dst_value, src_value);
            }
        } else {
            dst_map.insert(key.clone(), src_value.clone());
        }
    }
}

/// Round to the nearest whole unit, halves towards positive infinity.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
