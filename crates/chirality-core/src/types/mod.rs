//! Data model: cells, grids, tensors, operations and stations
//!
//! All entities are immutable once built. Each exposes `to_record` and a
//! `parse` that re-checks every invariant, so a parsed entity is as
//! trustworthy as a freshly constructed one.

mod cell;
mod grid;
mod metadata;
mod operation;
mod station;
mod tensor;

pub use cell::{Cell, CellContent, Modality};
pub use grid::{CellDraft, Dimensions, Grid, GridBuilder};
pub use metadata::{CellProvenance, Extensions, Metadata};
pub use operation::{BackendDescriptor, Operation};
pub use station::{Station, StationType};
pub use tensor::Tensor;

use crate::canonical::EncodingError;
use crate::hash::ContentHash;
use crate::ids::{CellId, GridId, OperationId};
use crate::kind::{GridKind, OperationKind};

/// Data model invariant violations
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Rows of differing length
    #[error("ragged rows: row {row} has {actual} cells, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Declared dimensions do not match the cell count
    #[error("dimensions {declared} do not match {cells} cells")]
    DimensionMismatch { declared: Dimensions, cells: usize },

    /// Declared dimensions overflow `usize`
    #[error("dimensions {0} overflow")]
    DimensionOverflow(Dimensions),

    /// Cell stored out of row-major order
    #[error("cell {index} is at {actual:?}, expected {expected:?}")]
    CellOutOfPlace {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Stored cell id does not match its content and position
    #[error("cell ({row}, {col}) has id {actual}, expected {expected}")]
    CellIdMismatch {
        row: usize,
        col: usize,
        expected: CellId,
        actual: CellId,
    },

    /// Stored content hash does not match the cells
    #[error("content hash mismatch: recorded {expected}, computed {actual}")]
    ContentHashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Grid id names a different kind
    #[error("grid id {id} does not name kind {kind}")]
    KindMismatch { id: GridId, kind: GridKind },

    /// Neither a thread nor an explicit id was given
    #[error("grid needs a thread or an explicit id")]
    MissingIdentity,

    /// Tensor layer with a different shape
    #[error("tensor layer {layer} is {actual}, expected {expected}")]
    TensorLayerShape {
        layer: usize,
        expected: Dimensions,
        actual: Dimensions,
    },

    /// Declared tensor depth differs from the layer count
    #[error("tensor depth {declared} does not match {layers} layers")]
    DepthMismatch { declared: usize, layers: usize },

    /// Wrong number of operation inputs
    #[error("operation {kind} takes {expected} inputs, got {actual}")]
    OperationArity {
        kind: OperationKind,
        expected: usize,
        actual: usize,
    },

    /// Stored operation id does not match its fields
    #[error("operation id {actual} does not match recomputed {expected}")]
    OperationIdMismatch {
        expected: OperationId,
        actual: OperationId,
    },

    /// Content could not be canonicalized
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Malformed record
    #[error("malformed record: {0}")]
    Parse(#[from] serde_json::Error),
}
