//! Deterministic identifiers
//!
//! Every id is `<tag>_<digest>` where the digest is the first
//! [`DIGEST_HEX_LEN`] hex chars of a SHA-256 over `:`-joined canonical parts.
//! 64 bits keeps the birthday collision probability below 1e-7 for a
//! namespace of 1e6 entities.
//!
//! | Id | Hashed content |
//! |----|----------------|
//! | [`ThreadId`] | `user:session:timestamp` |
//! | [`GridId`] | `kind:thread:sequence` (positional, not content) |
//! | [`CellId`] | `grid:row:col:canonical_content` |
//! | [`OperationId`] | `kind:sorted_inputs:output_content_hash:request_hash` |
//! | [`TensorId`] | `name:thread:sequence` |

use crate::canonical::canonical_text;
use crate::hash::ContentHash;
use crate::kind::{GridKind, OperationKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Hex chars kept from the SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 16;

fn digest(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(&hash[..DIGEST_HEX_LEN / 2])
}

fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn is_grid_body(s: &str) -> bool {
    s.split_once('_')
        .is_some_and(|(kind, hex)| kind.parse::<GridKind>().is_ok() && is_digest(hex))
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $check:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Type tag including the trailing underscore
            pub const PREFIX: &'static str = $prefix;

            /// Borrow as string slice
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.strip_prefix($prefix) {
                    Some(body) if $check(body) => Ok(Self(s.to_string())),
                    _ => Err(IdError {
                        expected: $prefix,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

prefixed_id!(
    /// Session namespace for grid sequencing
    ThreadId,
    "thread_",
    is_digest
);
prefixed_id!(
    /// Positional grid identity, `matrix_<KIND>_<digest>`
    GridId,
    "matrix_",
    is_grid_body
);
prefixed_id!(
    /// Cell identity within its grid
    CellId,
    "cell_",
    is_digest
);
prefixed_id!(
    /// Provenance record identity
    OperationId,
    "op_",
    is_digest
);
prefixed_id!(
    /// Tensor identity
    TensorId,
    "tensor_",
    is_digest
);

impl GridId {
    /// Kind embedded in the id
    #[must_use]
    pub fn kind(&self) -> Option<GridKind> {
        self.0[GridId::PREFIX.len()..]
            .split_once('_')
            .and_then(|(kind, _)| kind.parse().ok())
    }
}

/// Malformed identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier '{value}': expected '{expected}' followed by {len} hex chars", len = DIGEST_HEX_LEN)]
pub struct IdError {
    /// Expected prefix
    pub expected: &'static str,
    /// Rejected value
    pub value: String,
}

/// Thread id from a user/session pair and an explicit timestamp
#[must_use]
pub fn thread_id(user: &str, session: &str, timestamp: &str) -> ThreadId {
    let content = format!(
        "{}:{}:{}",
        canonical_text(user),
        canonical_text(session),
        canonical_text(timestamp)
    );
    ThreadId(format!("{}{}", ThreadId::PREFIX, digest(&content)))
}

/// Thread id stamped with the current UTC time
///
/// This is the only non-deterministic constructor in the crate. The returned
/// timestamp must be stored by the caller to reproduce the id later.
#[must_use]
pub fn thread_id_now(user: &str, session: &str) -> (ThreadId, String) {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    (thread_id(user, session, &timestamp), timestamp)
}

/// Grid id; depends on position in the thread, never on content
#[must_use]
pub fn matrix_id(kind: GridKind, thread: &ThreadId, sequence: u32) -> GridId {
    let content = format!("{kind}:{thread}:{sequence}");
    GridId(format!("{}{}_{}", GridId::PREFIX, kind, digest(&content)))
}

/// Cell id from parent grid, position and canonical content
#[must_use]
pub fn cell_id(grid: &GridId, row: usize, col: usize, canonical_content: &str) -> CellId {
    let content = format!("{grid}:{row}:{col}:{canonical_content}");
    CellId(format!("{}{}", CellId::PREFIX, digest(&content)))
}

/// Operation id; input ids are sorted so argument order does not matter
///
/// The output grid id and sequence are not part of the digest. An op id is
/// unique per (kind, inputs, output content, request), not per output grid:
/// two runs that differ only in sequence share an op id while pointing at
/// different outputs.
#[must_use]
pub fn operation_id(
    kind: OperationKind,
    inputs: &[GridId],
    output_content_hash: &ContentHash,
    request_hash: &ContentHash,
) -> OperationId {
    let mut sorted: Vec<&str> = inputs.iter().map(GridId::as_str).collect();
    sorted.sort_unstable();
    let content = format!(
        "{}:{}:{}:{}",
        kind.symbol(),
        sorted.join(":"),
        output_content_hash,
        request_hash
    );
    OperationId(format!("{}{}", OperationId::PREFIX, digest(&content)))
}

/// Tensor id, positional like [`matrix_id`]
#[must_use]
pub fn tensor_id(name: &str, thread: &ThreadId, sequence: u32) -> TensorId {
    let content = format!("{}:{thread}:{sequence}", canonical_text(name));
    TensorId(format!("{}{}", TensorId::PREFIX, digest(&content)))
}
