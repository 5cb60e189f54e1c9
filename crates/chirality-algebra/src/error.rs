//! Error types for the operation algebra
//!
//! - [`ResolutionError`]: the resolver could not produce a well-shaped result
//! - [`AlgebraError`]: anything that aborts an operation invocation

use chirality_core::{Dimensions, EncodingError, ModelError, ValidationErrors};

/// Resolver failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// Returned values do not have the expected shape
    #[error("expected {expected} values, {detail}")]
    ShapeMismatch { expected: Dimensions, detail: String },

    /// Payload could not be interpreted
    #[error("malformed resolver payload: {0}")]
    Malformed(String),

    /// Backend refused the request; retrying will not help
    #[error("backend rejected request: {0}")]
    Rejected(String),

    /// Transient backend failures persisted through every attempt
    #[error("backend failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: String },

    /// Cache key or payload could not be canonicalized
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl ResolutionError {
    /// Shape mismatch against `expected`
    pub fn shape(expected: Dimensions, detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected,
            detail: detail.into(),
        }
    }

    /// True if the failure came from a transient backend condition
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

impl From<EncodingError> for ResolutionError {
    fn from(err: EncodingError) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Errors that abort an operation invocation
///
/// No partial output accompanies any of these.
#[derive(Debug, thiserror::Error)]
pub enum AlgebraError {
    /// Inputs are incompatible; raised before the resolver is called
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Resolver failed or returned a mis-shaped result
    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Request or output could not be canonicalized
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// Output violated a data model invariant
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl AlgebraError {
    /// True if the failure originated in a transient backend condition
    ///
    /// The resolver has already spent its retry budget by the time this is
    /// seen; it classifies the cause and is not a request to retry. Validation
    /// and encoding failures are defects in the inputs and never transient.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Resolution(err) if err.is_transient())
    }
}
