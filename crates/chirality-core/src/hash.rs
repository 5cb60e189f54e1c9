//! Content hashing primitives
//!
//! Provides [`ContentHash`], the 32-byte Blake3 digest used for grid content
//! hashes, tensor content hashes and resolver request hashes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 32-byte content hash (Blake3)
///
/// Content hashes change if and only if the canonical content they cover
/// changes. Records carry them as lowercase hex strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Blake3 digest of arbitrary bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest of an already canonical string
    ///
    /// Callers are expected to pass the output of
    /// [`canonicalize`](crate::canonical::canonicalize); no normalization
    /// happens here.
    #[inline]
    #[must_use]
    pub fn of_canonical(canonical: &str) -> Self {
        Self::compute(canonical.as_bytes())
    }

    /// Digest over several canonical parts joined with `:`
    ///
    /// Used for Merkle leaves such as `row:col:content`.
    #[must_use]
    pub fn of_parts(parts: &[&str]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                hasher.update(b":");
            }
            hasher.update(part.as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// True for the all-zero hash (content hash of an empty grid)
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl TryFrom<&[u8]> for ContentHash {
    type Error = HashError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 32]>::try_from(bytes)
            .map(Self)
            .map_err(|_| HashError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(s)?.as_slice())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_string()
    }
}

/// Malformed hex hash
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("expected {expected} hash bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
