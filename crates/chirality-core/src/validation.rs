//! Shape compatibility checks run before any operation
//!
//! [`validate_compatible`] collects every problem instead of stopping at the
//! first, so callers can report a batch. [`check`] is the gate the algebra
//! uses: it turns a non-empty list into an error and otherwise yields the
//! output shape.

use crate::ids::GridId;
use crate::kind::OperationKind;
use crate::types::{Dimensions, Grid};
use std::fmt;

/// Incompatibility between an operation and its inputs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Wrong number of inputs for the operation
    #[error("{kind} takes {expected} input(s), got {actual}")]
    ArityMismatch {
        kind: OperationKind,
        expected: usize,
        actual: usize,
    },

    /// `combine` needs `left.cols == right.rows`
    #[error("inner dimensions differ: left is {left}, right is {right}")]
    InnerDimensionMismatch { left: Dimensions, right: Dimensions },

    /// Cell-wise operations need equal shapes
    #[error("{kind} needs equal shapes: left is {left}, right is {right}")]
    ShapeMismatch {
        kind: OperationKind,
        left: Dimensions,
        right: Dimensions,
    },

    /// Output shape does not fit in `usize`
    #[error("{kind} output for {left} and {right} overflows")]
    DimensionOverflow {
        kind: OperationKind,
        left: Dimensions,
        right: Dimensions,
    },

    /// Output would take the positional id of one of its inputs
    #[error("output id {0} is already held by an input grid")]
    OutputIdCollision(GridId),
}

/// Non-empty batch of validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Individual errors in detection order
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn shape_of(
    kind: OperationKind,
    inputs: &[&Grid],
) -> Result<Dimensions, Vec<ValidationError>> {
    if inputs.len() != kind.arity() {
        return Err(vec![ValidationError::ArityMismatch {
            kind,
            expected: kind.arity(),
            actual: inputs.len(),
        }]);
    }

    let left = inputs[0].dimensions();
    let Some(right) = inputs.get(1).map(|g| g.dimensions()) else {
        // interpret: any shape, preserved
        return Ok(left);
    };

    let mut errors = Vec::new();
    let shape = match kind {
        OperationKind::Combine => {
            if left.cols != right.rows {
                errors.push(ValidationError::InnerDimensionMismatch { left, right });
            }
            Dimensions::new(left.rows, right.cols)
        }
        OperationKind::Merge | OperationKind::Elementwise => {
            if left != right {
                errors.push(ValidationError::ShapeMismatch { kind, left, right });
            }
            left
        }
        OperationKind::Expand => {
            let rows = left.rows.checked_mul(right.rows);
            let cols = left.cols.checked_mul(right.cols);
            match rows.zip(cols) {
                Some((rows, cols)) => Dimensions::new(rows, cols),
                None => {
                    errors.push(ValidationError::DimensionOverflow { kind, left, right });
                    left
                }
            }
        }
        OperationKind::Interpret => left,
    };

    if shape.cell_count().is_none() {
        errors.push(ValidationError::DimensionOverflow { kind, left, right });
    }

    if errors.is_empty() {
        Ok(shape)
    } else {
        Err(errors)
    }
}

/// Every incompatibility between `kind` and `inputs` (empty when compatible)
#[must_use]
pub fn validate_compatible(kind: OperationKind, inputs: &[&Grid]) -> Vec<ValidationError> {
    shape_of(kind, inputs).err().unwrap_or_default()
}

/// Output shape of `kind` applied to `inputs`
///
/// # Errors
/// Returns every incompatibility found
pub fn check(kind: OperationKind, inputs: &[&Grid]) -> Result<Dimensions, ValidationErrors> {
    shape_of(kind, inputs).map_err(ValidationErrors)
}

/// Reject an output id equal to any input id
///
/// Grid ids are positional, so an operation whose output kind matches an
/// input kind at the same thread position would otherwise replace that
/// input under its own id.
///
/// # Errors
/// [`ValidationError::OutputIdCollision`]
pub fn check_output_id(output: &GridId, inputs: &[&Grid]) -> Result<(), ValidationErrors> {
    if inputs.iter().any(|g| g.id() == output) {
        Err(ValidationErrors(vec![ValidationError::OutputIdCollision(
            output.clone(),
        )]))
    } else {
        Ok(())
    }
}
