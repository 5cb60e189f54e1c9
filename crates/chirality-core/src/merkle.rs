//! Merkle content trees
//!
//! Grid and tensor content hashes are Merkle roots over position-bound
//! leaves, built with `rs_merkle` and a Blake3 hasher. Besides the root this
//! gives cheap inclusion proofs for single cells.

use crate::hash::ContentHash;
use rs_merkle::{Hasher, MerkleTree};

/// Merkle tree over content leaves in a fixed order
pub struct ContentTree {
    inner: MerkleTree<Blake3Hasher>,
}

impl std::fmt::Debug for ContentTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentTree")
            .field("leaf_count", &self.leaf_count())
            .field("root", &self.root())
            .finish()
    }
}

impl ContentTree {
    /// Build from leaf hashes (order is significant)
    #[must_use]
    pub fn from_leaves(leaves: &[ContentHash]) -> Self {
        let leaves: Vec<_> = leaves.iter().map(|h| *h.as_bytes()).collect();
        Self {
            inner: MerkleTree::from_leaves(&leaves),
        }
    }

    /// Root hash; the zero hash for an empty tree
    #[inline]
    #[must_use]
    pub fn root(&self) -> ContentHash {
        self.inner.root().map_or_else(ContentHash::default, ContentHash::new)
    }

    /// Number of leaves
    #[inline]
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.inner.leaves().map_or(0, |leaves| leaves.len())
    }

    /// Inclusion proof for the leaf at `index`, `None` if out of range
    #[must_use]
    pub fn proof(&self, index: usize) -> Option<InclusionProof> {
        if index >= self.leaf_count() {
            return None;
        }
        Some(InclusionProof {
            inner: self.inner.proof(&[index]),
            index,
            total_leaves: self.leaf_count(),
        })
    }
}

/// Proof that one leaf is part of a content root
pub struct InclusionProof {
    inner: rs_merkle::MerkleProof<Blake3Hasher>,
    index: usize,
    total_leaves: usize,
}

impl std::fmt::Debug for InclusionProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InclusionProof")
            .field("index", &self.index)
            .field("total_leaves", &self.total_leaves)
            .finish_non_exhaustive()
    }
}

impl InclusionProof {
    /// Leaf position this proof was issued for
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Check `leaf` against `root` without access to the tree
    #[must_use]
    pub fn verify(&self, leaf: ContentHash, root: ContentHash) -> bool {
        self.inner.verify(
            *root.as_bytes(),
            &[self.index],
            &[*leaf.as_bytes()],
            self.total_leaves,
        )
    }
}

/// Blake3 hasher adapter for rs_merkle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    type Hash = [u8; 32];

    #[inline]
    fn hash(data: &[u8]) -> Self::Hash {
        *blake3::hash(data).as_bytes()
    }
}
