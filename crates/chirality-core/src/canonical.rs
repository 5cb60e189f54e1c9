//! Canonical string forms
//!
//! [`canonicalize`] is the sole input to every hash in the system. Equal
//! logical values produce byte-identical output:
//! - text is NFKC-normalized, whitespace runs collapse to one space, ends trimmed
//! - maps serialize as compact JSON with lexicographically sorted keys
//! - sequences serialize as compact JSON preserving element order
//! - other scalars use their JSON (locale independent) rendering; `NaN` and
//!   infinities have none and are rejected
//!
//! Strings nested inside maps and sequences are normalized like top-level
//! text, which keeps `canonicalize(canonicalize(x)) == canonicalize(x)`.

use crate::finite::ensure_finite;
use serde::Serialize;
use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;

/// Normalize free text: NFKC, collapse whitespace runs, trim
#[must_use]
pub fn canonical_text(text: &str) -> String {
    let normalized: String = text.nfkc().collect();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of any serializable value
///
/// # Errors
/// Returns [`EncodingError`] if the value holds a non-finite float, cannot
/// be represented as JSON, or two map keys collapse to the same canonical key.
pub fn canonicalize<T>(value: &T) -> Result<String, EncodingError>
where
    T: Serialize + ?Sized,
{
    ensure_finite(value)?;
    let value = serde_json::to_value(value)?;
    canonicalize_value(&value)
}

/// Canonical form of an already parsed JSON value
///
/// # Errors
/// Returns [`EncodingError::DuplicateKey`] when normalization merges two keys.
pub fn canonicalize_value(value: &Value) -> Result<String, EncodingError> {
    match value {
        Value::String(s) => Ok(canonical_text(s)),
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
        Value::Array(_) | Value::Object(_) => {
            let normalized = normalize(value)?;
            Ok(serde_json::to_string(&normalized)?)
        }
    }
}

/// Canonical JSON bytes, for callers that hash structured records directly
///
/// # Errors
/// Same as [`canonicalize`].
pub fn canonical_json_bytes<T>(value: &T) -> Result<Vec<u8>, EncodingError>
where
    T: Serialize + ?Sized,
{
    Ok(canonicalize(value)?.into_bytes())
}

fn normalize(value: &Value) -> Result<Value, EncodingError> {
    match value {
        Value::String(s) => Ok(Value::String(canonical_text(s))),
        Value::Array(items) => items
            .iter()
            .map(normalize)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, item) in map {
                entries.push((canonical_text(key), normalize(item)?));
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut out = Map::new();
            for (key, item) in entries {
                if out.contains_key(&key) {
                    return Err(EncodingError::DuplicateKey(key));
                }
                out.insert(key, item);
            }
            Ok(Value::Object(out))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
    }
}

/// A value that cannot be brought into canonical form
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// Value is not representable as JSON (e.g. a map with non-string keys)
    #[error("value is not encodable: {0}")]
    Unencodable(#[from] serde_json::Error),

    /// `NaN` or an infinity; JSON would silently turn it into `null`
    #[error("non-finite float {0} has no canonical form")]
    NonFinite(String),

    /// Two distinct keys normalize to the same canonical key
    #[error("map keys collide after normalization: '{0}'")]
    DuplicateKey(String),
}
