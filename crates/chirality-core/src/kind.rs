//! Grid and operation kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical role of a grid within a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GridKind {
    /// Axioms
    A,
    /// Basis
    B,
    /// Composition (`A * B`)
    C,
    /// Domain (`A + F`)
    D,
    /// Function (`J ⊙ C`)
    F,
    /// Judgment (`interpret(B)`)
    J,
    /// Expansion (`A × B`)
    W,
}

impl GridKind {
    /// All kinds in declaration order
    pub const ALL: [GridKind; 7] = [
        GridKind::A,
        GridKind::B,
        GridKind::C,
        GridKind::D,
        GridKind::F,
        GridKind::J,
        GridKind::W,
    ];

    /// Single-letter label used in ids and records
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            GridKind::A => "A",
            GridKind::B => "B",
            GridKind::C => "C",
            GridKind::D => "D",
            GridKind::F => "F",
            GridKind::J => "J",
            GridKind::W => "W",
        }
    }
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GridKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// The five operations of the algebra
///
/// Serialized by symbol (`*`, `+`, `⊙`, `interpret`, `×`); parsing also
/// accepts the lowercase names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// `C = A * B`, dot-product-like
    #[serde(rename = "*")]
    Combine,
    /// `D = A + F`, cell-wise
    #[serde(rename = "+")]
    Merge,
    /// `F = J ⊙ C`, cell-wise with its own provenance tag
    #[serde(rename = "⊙")]
    Elementwise,
    /// `J = interpret(B)`, unary and shape-preserving
    #[serde(rename = "interpret")]
    Interpret,
    /// `W = A × B`, block cross product
    #[serde(rename = "×")]
    Expand,
}

impl OperationKind {
    /// All kinds in declaration order
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Combine,
        OperationKind::Merge,
        OperationKind::Elementwise,
        OperationKind::Interpret,
        OperationKind::Expand,
    ];

    /// Operator symbol, used in ids and provenance records
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            OperationKind::Combine => "*",
            OperationKind::Merge => "+",
            OperationKind::Elementwise => "⊙",
            OperationKind::Interpret => "interpret",
            OperationKind::Expand => "×",
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            OperationKind::Combine => "combine",
            OperationKind::Merge => "merge",
            OperationKind::Elementwise => "elementwise",
            OperationKind::Interpret => "interpret",
            OperationKind::Expand => "expand",
        }
    }

    /// Number of input grids
    #[must_use]
    pub const fn arity(&self) -> usize {
        match self {
            OperationKind::Interpret => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for OperationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|k| k.symbol() == s || k.name() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Unrecognized grid or operation kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kind: '{0}'")]
pub struct UnknownKind(pub String);
