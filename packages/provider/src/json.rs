//! Lenient readers for provider JSON.
//!
//! Providers disagree on whether numbers arrive as JSON numbers or as
//! strings (`"lat": "41.88"`), and optional fields may be absent or
//! `null`. These helpers read only the fields the engine needs and treat
//! everything else as noise.

use serde_json::Value;

use crate::ProviderError;

/// Reads `value[key]` as an `f64`, accepting numbers and numeric strings.
#[must_use]
pub fn f64_field(value: &Value, key: &str) -> Option<f64> {
    let number = match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// Reads `value[key]` as a non-empty string.
#[must_use]
pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Reads `value[key]` as an array, treating absence as empty.
#[must_use]
pub fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// Reads a required numeric field.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] naming `context` and `key` if the
/// field is missing or not numeric.
pub fn require_f64(value: &Value, key: &str, context: &str) -> Result<f64, ProviderError> {
    f64_field(value, key)
        .ok_or_else(|| ProviderError::parse(format!("missing {key} in {context} response")))
}
