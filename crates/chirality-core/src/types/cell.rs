//! Cells: the atomic positioned values of a grid

use super::metadata::CellProvenance;
use super::ModelError;
use crate::canonical::{canonical_text, canonicalize, EncodingError};
use crate::hash::ContentHash;
use crate::ids::{cell_id, CellId, GridId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic modality of a cell's content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Axiom,
    Theory,
    Concept,
    Process,
    Instance,
    Value,
    #[default]
    Unknown,
}

/// Cell payload: a text value plus optional structured attributes
///
/// The canonical form of this struct is the cell's "canonical content",
/// hashed into the cell id and the grid content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CellContent {
    /// Primary value, stored in canonical text form
    pub text: String,
    /// Structured attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl CellContent {
    /// Content holding only a text value (normalized on the way in)
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self {
            text: canonical_text(value),
            attributes: BTreeMap::new(),
        }
    }

    /// Add a structured attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Canonical form used for hashing
    ///
    /// # Errors
    /// Returns error if attribute keys collide after normalization
    pub fn canonical(&self) -> Result<String, EncodingError> {
        canonicalize(self)
    }
}

impl From<&str> for CellContent {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for CellContent {
    fn from(value: String) -> Self {
        Self::text(&value)
    }
}

/// A value at a fixed position inside one grid
///
/// # Invariants
/// - `id == cell_id(parent, row, col, content.canonical())`
/// - Immutable after construction; a corrected value is a new cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cell {
    id: CellId,
    row: usize,
    col: usize,
    content: CellContent,
    #[serde(default)]
    modality: Modality,
    #[serde(default)]
    provenance: CellProvenance,
}

impl Cell {
    /// Create a cell owned by `grid` at `(row, col)`
    ///
    /// # Errors
    /// Returns error if the content has no canonical form
    pub fn new(
        grid: &GridId,
        row: usize,
        col: usize,
        content: CellContent,
    ) -> Result<Self, EncodingError> {
        let canonical = content.canonical()?;
        Ok(Self {
            id: cell_id(grid, row, col, &canonical),
            row,
            col,
            content,
            modality: Modality::Unknown,
            provenance: CellProvenance::default(),
        })
    }

    /// Set modality
    #[must_use]
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }

    /// Set provenance
    #[must_use]
    pub fn with_provenance(mut self, provenance: CellProvenance) -> Self {
        self.provenance = provenance;
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &CellId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn row(&self) -> usize {
        self.row
    }

    #[inline]
    #[must_use]
    pub fn col(&self) -> usize {
        self.col
    }

    #[inline]
    #[must_use]
    pub fn content(&self) -> &CellContent {
        &self.content
    }

    /// Shorthand for `content().text`
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.content.text
    }

    #[inline]
    #[must_use]
    pub fn modality(&self) -> Modality {
        self.modality
    }

    #[inline]
    #[must_use]
    pub fn provenance(&self) -> &CellProvenance {
        &self.provenance
    }

    /// Merkle leaf: `row:col:canonical_content`
    ///
    /// Pair with [`Grid::prove_cell`](super::Grid::prove_cell) to check a
    /// single cell against a grid's content hash.
    ///
    /// # Errors
    /// Returns error if the content has no canonical form
    pub fn leaf_hash(&self) -> Result<ContentHash, EncodingError> {
        let canonical = self.content.canonical()?;
        Ok(ContentHash::of_parts(&[
            &self.row.to_string(),
            &self.col.to_string(),
            &canonical,
        ]))
    }

    /// Check the stored id against `grid`
    ///
    /// # Errors
    /// Returns [`ModelError::CellIdMismatch`] if the id does not match
    pub fn verify(&self, grid: &GridId) -> Result<(), ModelError> {
        let canonical = self.content.canonical()?;
        let expected = cell_id(grid, self.row, self.col, &canonical);
        if expected != self.id {
            return Err(ModelError::CellIdMismatch {
                row: self.row,
                col: self.col,
                expected,
                actual: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Structured record
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_record(&self) -> Result<serde_json::Value, EncodingError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse a record produced by [`to_record`](Self::to_record)
    ///
    /// Structure only; use [`verify`](Self::verify) to check the id against
    /// its parent grid.
    ///
    /// # Errors
    /// Returns error on missing or unknown fields
    pub fn parse(record: &serde_json::Value) -> Result<Self, ModelError> {
        Ok(Self::deserialize(record)?)
    }
}
