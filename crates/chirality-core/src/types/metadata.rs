//! Typed metadata for grids and cells
//!
//! Recognized keys are explicit fields; anything else goes into
//! [`Extensions`], an opaque byte map serialized as hex.

use crate::ids::CellId;
use crate::kind::OperationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Opaque key/bytes pairs kept for forward compatibility
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions(BTreeMap<String, Vec<u8>>);

impl Extensions {
    /// Empty extension map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw bytes for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// True when no entries are present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Extensions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, hex::encode(v))))
    }
}

impl<'de> Deserialize<'de> for Extensions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                hex::decode(&v)
                    .map(|bytes| (k, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

/// Grid metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Metadata {
    /// Pipeline stage label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    /// Creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Sequence number within the thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    /// Unrecognized entries
    #[serde(skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
}

/// Where a cell's value came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CellProvenance {
    /// Operation that produced the cell; `None` for axiomatic input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKind>,
    /// Contributing source cells, in input order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<CellId>,
    /// Unrecognized entries
    #[serde(skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
}

impl CellProvenance {
    /// Provenance of a derived cell
    #[must_use]
    pub fn derived(operation: OperationKind, sources: Vec<CellId>) -> Self {
        Self {
            operation: Some(operation),
            derived_from: sources,
            extensions: Extensions::new(),
        }
    }

    /// True for cells that were supplied directly
    #[inline]
    #[must_use]
    pub fn is_axiomatic(&self) -> bool {
        self.operation.is_none()
    }
}
