//! Tensors: ordered stacks of equally shaped grids

use super::grid::{Dimensions, Grid};
use super::ModelError;
use crate::hash::ContentHash;
use crate::ids::{tensor_id, TensorId, ThreadId};
use crate::merkle::ContentTree;
use serde::{Deserialize, Serialize};

/// Stack of grids sharing one shape
///
/// `content_hash` is the Merkle root over the layers' content hashes in
/// depth order, so re-ordering layers changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TensorRecord")]
pub struct Tensor {
    id: TensorId,
    name: String,
    depth: usize,
    content_hash: ContentHash,
    layers: Vec<Grid>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TensorRecord {
    id: TensorId,
    name: String,
    depth: usize,
    content_hash: ContentHash,
    layers: Vec<Grid>,
}

impl TryFrom<TensorRecord> for Tensor {
    type Error = ModelError;

    fn try_from(record: TensorRecord) -> Result<Self, Self::Error> {
        let tensor = Self {
            id: record.id,
            name: record.name,
            depth: record.depth,
            content_hash: record.content_hash,
            layers: record.layers,
        };
        tensor.verify()?;
        Ok(tensor)
    }
}

fn layers_hash(layers: &[Grid]) -> ContentHash {
    let leaves: Vec<_> = layers.iter().map(|g| *g.content_hash()).collect();
    ContentTree::from_leaves(&leaves).root()
}

fn check_layer_shapes(layers: &[Grid]) -> Result<(), ModelError> {
    let Some(first) = layers.first() else {
        return Ok(());
    };
    let expected = first.dimensions();
    match layers
        .iter()
        .enumerate()
        .find(|(_, g)| g.dimensions() != expected)
    {
        Some((layer, g)) => Err(ModelError::TensorLayerShape {
            layer,
            expected,
            actual: g.dimensions(),
        }),
        None => Ok(()),
    }
}

impl Tensor {
    /// Stack `layers` under a positional id derived from `(name, thread, sequence)`
    ///
    /// # Errors
    /// Returns [`ModelError::TensorLayerShape`] if layers differ in shape
    pub fn new(
        name: &str,
        thread: &ThreadId,
        sequence: u32,
        layers: Vec<Grid>,
    ) -> Result<Self, ModelError> {
        check_layer_shapes(&layers)?;
        Ok(Self {
            id: tensor_id(name, thread, sequence),
            name: name.to_string(),
            depth: layers.len(),
            content_hash: layers_hash(&layers),
            layers,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &TensorId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    #[inline]
    #[must_use]
    pub fn layers(&self) -> &[Grid] {
        &self.layers
    }

    /// Shared layer shape (`None` for an empty stack)
    #[must_use]
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.layers.first().map(Grid::dimensions)
    }

    /// Re-check depth, layer shapes, every layer and the content hash
    ///
    /// # Errors
    /// Returns the first violated invariant
    pub fn verify(&self) -> Result<(), ModelError> {
        if self.depth != self.layers.len() {
            return Err(ModelError::DepthMismatch {
                declared: self.depth,
                layers: self.layers.len(),
            });
        }
        check_layer_shapes(&self.layers)?;
        for layer in &self.layers {
            layer.verify()?;
        }
        let actual = layers_hash(&self.layers);
        if actual != self.content_hash {
            return Err(ModelError::ContentHashMismatch {
                expected: self.content_hash,
                actual,
            });
        }
        Ok(())
    }

    /// Structured record
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_record(&self) -> Result<serde_json::Value, crate::canonical::EncodingError> {
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
