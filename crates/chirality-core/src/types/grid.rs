//! Grids: rectangular, content-hashed collections of cells

use super::cell::{Cell, CellContent, Modality};
use super::metadata::{CellProvenance, Metadata};
use super::ModelError;
use crate::canonical::EncodingError;
use crate::hash::ContentHash;
use crate::ids::{matrix_id, GridId, ThreadId};
use crate::kind::GridKind;
use crate::merkle::{ContentTree, InclusionProof};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub rows: usize,
    pub cols: usize,
}

impl Dimensions {
    #[inline]
    #[must_use]
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of cells (`None` on overflow)
    #[inline]
    #[must_use]
    pub fn cell_count(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Content hash over cells in row-major order
pub(crate) fn content_hash_of(cells: &[Cell]) -> Result<ContentHash, EncodingError> {
    let leaves = cells
        .iter()
        .map(Cell::leaf_hash)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ContentTree::from_leaves(&leaves).root())
}

/// Rectangular 2-D collection of cells
///
/// # Invariants
/// - `cells.len() == rows * cols`, stored row-major, each cell at its own position
/// - every cell id is derived from this grid's id
/// - `content_hash` covers every cell's canonical content and position
/// - `id` is positional (kind, thread, sequence) and independent of content
///
/// Deserialization goes through the same checks as [`Grid::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridRecord")]
pub struct Grid {
    id: GridId,
    kind: GridKind,
    dimensions: Dimensions,
    content_hash: ContentHash,
    cells: Vec<Cell>,
    metadata: Metadata,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GridRecord {
    id: GridId,
    kind: GridKind,
    dimensions: Dimensions,
    content_hash: ContentHash,
    cells: Vec<Cell>,
    #[serde(default)]
    metadata: Metadata,
}

impl TryFrom<GridRecord> for Grid {
    type Error = ModelError;

    fn try_from(record: GridRecord) -> Result<Self, Self::Error> {
        let grid = Self {
            id: record.id,
            kind: record.kind,
            dimensions: record.dimensions,
            content_hash: record.content_hash,
            cells: record.cells,
            metadata: record.metadata,
        };
        grid.verify()?;
        Ok(grid)
    }
}

impl Grid {
    /// Start building a grid of `kind`
    #[inline]
    #[must_use]
    pub fn builder(kind: GridKind) -> GridBuilder {
        GridBuilder::new(kind)
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &GridId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> GridKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> usize {
        self.dimensions.rows
    }

    #[inline]
    #[must_use]
    pub fn cols(&self) -> usize {
        self.dimensions.cols
    }

    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// All cells, row-major
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// True when the grid holds no cells
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at `(row, col)`
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        self.cells.get(row * self.cols() + col)
    }

    /// One row as a slice
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        if row >= self.rows() {
            return None;
        }
        let start = row * self.cols();
        self.cells.get(start..start + self.cols())
    }

    /// One column, top to bottom
    #[must_use]
    pub fn column(&self, col: usize) -> Option<Vec<&Cell>> {
        if col >= self.cols() {
            return None;
        }
        Some(
            (0..self.rows())
                .filter_map(|row| self.get(row, col))
                .collect(),
        )
    }

    /// Cell texts as nested rows
    #[must_use]
    pub fn values(&self) -> Vec<Vec<String>> {
        (0..self.rows())
            .map(|r| {
                self.row(r)
                    .unwrap_or_default()
                    .iter()
                    .map(|c| c.text().to_string())
                    .collect()
            })
            .collect()
    }

    /// Inclusion proof of the cell at `(row, col)` against [`content_hash`](Self::content_hash)
    ///
    /// # Errors
    /// Returns error if a cell has no canonical form
    pub fn prove_cell(&self, row: usize, col: usize) -> Result<Option<InclusionProof>, EncodingError> {
        if self.get(row, col).is_none() {
            return Ok(None);
        }
        let leaves = self
            .cells
            .iter()
            .map(Cell::leaf_hash)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ContentTree::from_leaves(&leaves).proof(row * self.cols() + col))
    }

    /// Re-check every invariant (layout, cell ids, content hash)
    ///
    /// # Errors
    /// Returns the first violated invariant
    pub fn verify(&self) -> Result<(), ModelError> {
        if self.id.kind() != Some(self.kind) {
            return Err(ModelError::KindMismatch {
                id: self.id.clone(),
                kind: self.kind,
            });
        }
        let expected = self
            .dimensions
            .cell_count()
            .ok_or(ModelError::DimensionOverflow(self.dimensions))?;
        if expected != self.cells.len() {
            return Err(ModelError::DimensionMismatch {
                declared: self.dimensions,
                cells: self.cells.len(),
            });
        }
        for (index, cell) in self.cells.iter().enumerate() {
            let (row, col) = (index / self.cols(), index % self.cols());
            if (cell.row(), cell.col()) != (row, col) {
                return Err(ModelError::CellOutOfPlace {
                    index,
                    expected: (row, col),
                    actual: (cell.row(), cell.col()),
                });
            }
            cell.verify(&self.id)?;
        }
        let actual = content_hash_of(&self.cells)?;
        if actual != self.content_hash {
            return Err(ModelError::ContentHashMismatch {
                expected: self.content_hash,
                actual,
            });
        }
        Ok(())
    }

    /// Structured record (map of fields)
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_record(&self) -> Result<serde_json::Value, EncodingError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse and verify a record produced by [`to_record`](Self::to_record)
    ///
    /// # Errors
    /// Returns error on malformed records or violated invariants
    pub fn parse(record: &serde_json::Value) -> Result<Self, ModelError> {
        Ok(Self::deserialize(record)?)
    }
}

/// Value, modality and provenance for one cell before ids exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellDraft {
    pub content: CellContent,
    pub modality: Modality,
    pub provenance: CellProvenance,
}

impl CellDraft {
    /// Draft with default modality and no provenance
    #[must_use]
    pub fn new(content: CellContent) -> Self {
        Self {
            content,
            modality: Modality::Unknown,
            provenance: CellProvenance::default(),
        }
    }

    /// Set provenance
    #[must_use]
    pub fn with_provenance(mut self, provenance: CellProvenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Set modality
    #[must_use]
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }
}

impl From<CellContent> for CellDraft {
    fn from(content: CellContent) -> Self {
        Self::new(content)
    }
}

impl From<&str> for CellDraft {
    fn from(value: &str) -> Self {
        Self::new(CellContent::text(value))
    }
}

impl From<String> for CellDraft {
    fn from(value: String) -> Self {
        Self::new(CellContent::text(&value))
    }
}

impl From<&String> for CellDraft {
    fn from(value: &String) -> Self {
        Self::new(CellContent::text(value))
    }
}

/// Builder for [`Grid`]
///
/// The grid id is `matrix_id(kind, thread, sequence)` unless set explicitly;
/// the sequence defaults to 1.
#[derive(Debug, Clone)]
pub struct GridBuilder {
    kind: GridKind,
    thread: Option<ThreadId>,
    sequence: u32,
    id: Option<GridId>,
    metadata: Metadata,
    rows: Vec<Vec<CellDraft>>,
}

impl GridBuilder {
    /// Create new builder
    #[inline]
    #[must_use]
    pub fn new(kind: GridKind) -> Self {
        Self {
            kind,
            thread: None,
            sequence: 1,
            id: None,
            metadata: Metadata::default(),
            rows: Vec::new(),
        }
    }

    /// Set thread namespace
    #[inline]
    #[must_use]
    pub fn thread(mut self, thread: ThreadId) -> Self {
        self.thread = Some(thread);
        self
    }

    /// Set sequence number within the thread
    #[inline]
    #[must_use]
    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Use an explicit id instead of deriving one
    #[inline]
    #[must_use]
    pub fn id(mut self, id: GridId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set station label
    #[inline]
    #[must_use]
    pub fn station(mut self, station: impl Into<String>) -> Self {
        self.metadata.station = Some(station.into());
        self
    }

    /// Set creation time
    #[inline]
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.metadata.timestamp = Some(timestamp);
        self
    }

    /// Attach an opaque extension entry
    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.metadata.extensions.insert(key, value);
        self
    }

    /// Append one row
    #[must_use]
    pub fn row<I, D>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<CellDraft>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }

    /// Append several rows
    #[must_use]
    pub fn rows<R, I, D>(self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = D>,
        D: Into<CellDraft>,
    {
        rows.into_iter().fold(self, |builder, row| builder.row(row))
    }

    /// Build grid
    ///
    /// # Errors
    /// - [`ModelError::RaggedRows`] if rows differ in length
    /// - [`ModelError::MissingIdentity`] if neither thread nor id was given
    /// - [`ModelError::KindMismatch`] if an explicit id names another kind
    pub fn build(self) -> Result<Grid, ModelError> {
        let cols = self.rows.first().map_or(0, Vec::len);
        if let Some((row, bad)) = self.rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(ModelError::RaggedRows {
                row,
                expected: cols,
                actual: bad.len(),
            });
        }

        let id = match (self.id, &self.thread) {
            (Some(id), _) => id,
            (None, Some(thread)) => matrix_id(self.kind, thread, self.sequence),
            (None, None) => return Err(ModelError::MissingIdentity),
        };
        if id.kind() != Some(self.kind) {
            return Err(ModelError::KindMismatch {
                id,
                kind: self.kind,
            });
        }

        let dimensions = Dimensions::new(self.rows.len(), cols);
        let mut cells = Vec::with_capacity(dimensions.cell_count().unwrap_or(0));
        for (r, row) in self.rows.into_iter().enumerate() {
            for (c, draft) in row.into_iter().enumerate() {
                let cell = Cell::new(&id, r, c, draft.content)?
                    .with_modality(draft.modality)
                    .with_provenance(draft.provenance);
                cells.push(cell);
            }
        }

        let mut metadata = self.metadata;
        metadata.sequence = Some(self.sequence);

        Ok(Grid {
            content_hash: content_hash_of(&cells)?,
            id,
            kind: self.kind,
            dimensions,
            cells,
            metadata,
        })
    }
}
