//! Chirality core
//!
//! Deterministic content addressing for semantic grids.
//!
//! # Core Concepts
//!
//! - [`canonicalize`]: the single canonical string form every hash is built on
//! - [`ids`]: positional and content-derived identifiers (`thread_`, `matrix_`, `cell_`, `op_`, `tensor_`)
//! - [`ContentHash`]: 32-byte Blake3 digest; grid content hashes are Merkle roots
//! - [`Grid`], [`Cell`], [`Tensor`], [`Operation`], [`Station`]: the immutable data model
//! - [`validation`]: shape compatibility checks for the five operations
//!
//! # Example
//!
//! ```rust
//! use chirality_core::{ids, Grid, GridKind};
//!
//! let thread = ids::thread_id("ada", "session-1", "2025-01-01T00:00:00Z");
//! let grid = Grid::builder(GridKind::A)
//!     .thread(thread)
//!     .row(["Necessary", "Contingent"])
//!     .build()?;
//! assert_eq!(grid.dimensions().cols, 2);
//! # Ok::<(), chirality_core::ModelError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod canonical;
mod finite;
mod hash;
pub mod ids;
mod kind;
pub mod merkle;
mod types;
pub mod validation;

pub use canonical::{
    canonical_json_bytes, canonical_text, canonicalize, canonicalize_value, EncodingError,
};
pub use hash::{ContentHash, HashError};
pub use ids::{CellId, GridId, IdError, OperationId, TensorId, ThreadId};
pub use kind::{GridKind, OperationKind, UnknownKind};
pub use types::{
    BackendDescriptor, Cell, CellContent, CellDraft, CellProvenance, Dimensions, Extensions, Grid,
    GridBuilder, Metadata, Modality, ModelError, Operation, Station, StationType, Tensor,
};
pub use validation::{validate_compatible, ValidationError, ValidationErrors};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
