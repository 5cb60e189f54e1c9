//! Strict parsing of completion payloads into raw grids
//!
//! Accepted forms:
//! - `{"shape": [rows, cols], "cells": [[...], ...]}` where the declared
//!   shape and the cell matrix both equal the expected shape
//! - `{"text": "..."}`, only when a single cell is expected
//!
//! String cells are canonicalized; numbers and booleans take their canonical
//! JSON rendering. Anything else is rejected, never padded or truncated.

use chirality_algebra::{RawGrid, ResolutionError};
use chirality_core::{canonical_text, canonicalize_value, Dimensions};
use serde_json::{Map, Value};

/// Parse `content` into exactly `expected` values
///
/// # Errors
/// [`ResolutionError::Malformed`] for unparseable or unrecognized payloads,
/// [`ResolutionError::ShapeMismatch`] when the shape differs from `expected`
pub fn parse_payload(content: &str, expected: Dimensions) -> Result<RawGrid, ResolutionError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| ResolutionError::Malformed(format!("not JSON: {e}")))?;
    let Value::Object(object) = value else {
        return Err(ResolutionError::Malformed(
            "payload is not a JSON object".into(),
        ));
    };

    if object.contains_key("cells") {
        return parse_cells(&object, expected);
    }

    match object.get("text") {
        Some(text) if expected == Dimensions::new(1, 1) => Ok(vec![vec![scalar(text, 0, 0)?]]),
        Some(_) => Err(ResolutionError::shape(
            expected,
            "got a single text value",
        )),
        None => Err(ResolutionError::Malformed(
            "payload has neither 'cells' nor 'text'".into(),
        )),
    }
}

fn parse_cells(object: &Map<String, Value>, expected: Dimensions) -> Result<RawGrid, ResolutionError> {
    let declared = declared_shape(object.get("shape"))?;
    if declared != expected {
        return Err(ResolutionError::shape(
            expected,
            format!("payload declares {declared}"),
        ));
    }

    let Some(Value::Array(rows)) = object.get("cells") else {
        return Err(ResolutionError::Malformed("'cells' is not an array".into()));
    };
    if rows.len() != expected.rows {
        return Err(ResolutionError::shape(
            expected,
            format!("got {} rows", rows.len()),
        ));
    }

    rows.iter()
        .enumerate()
        .map(|(r, row)| {
            let Value::Array(values) = row else {
                return Err(ResolutionError::Malformed(format!(
                    "row {r} is not an array"
                )));
            };
            if values.len() != expected.cols {
                return Err(ResolutionError::shape(
                    expected,
                    format!("row {r} has {} values", values.len()),
                ));
            }
            values
                .iter()
                .enumerate()
                .map(|(c, v)| scalar(v, r, c))
                .collect()
        })
        .collect()
}

fn declared_shape(shape: Option<&Value>) -> Result<Dimensions, ResolutionError> {
    let malformed = || ResolutionError::Malformed("'shape' must be [rows, cols]".into());
    match shape {
        Some(Value::Array(pair)) => match pair.as_slice() {
            [rows, cols] => {
                let rows = rows.as_u64().ok_or_else(malformed)?;
                let cols = cols.as_u64().ok_or_else(malformed)?;
                Ok(Dimensions::new(
                    usize::try_from(rows).map_err(|_| malformed())?,
                    usize::try_from(cols).map_err(|_| malformed())?,
                ))
            }
            _ => Err(malformed()),
        },
        _ => Err(malformed()),
    }
}

fn scalar(value: &Value, row: usize, col: usize) -> Result<String, ResolutionError> {
    match value {
        Value::String(s) => Ok(canonical_text(s)),
        Value::Number(_) | Value::Bool(_) => canonicalize_value(value).map_err(Into::into),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(ResolutionError::Malformed(
            format!("cell [{row},{col}] is not a scalar"),
        )),
    }
}
