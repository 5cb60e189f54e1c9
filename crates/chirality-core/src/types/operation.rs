//! Operation provenance records

use super::grid::Grid;
use super::ModelError;
use crate::canonical::EncodingError;
use crate::hash::ContentHash;
use crate::ids::{operation_id, GridId, OperationId};
use crate::kind::OperationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which resolver produced an output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendDescriptor {
    /// Resolver family, e.g. `synthetic` or `openai`
    pub vendor: String,
    /// Model or implementation name
    pub model: String,
    /// Implementation version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl BackendDescriptor {
    #[must_use]
    pub fn new(vendor: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            model: model.into(),
            version: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vendor, self.model)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

/// Immutable record of one computation step
///
/// Holds ids only; inputs and output live independently. The id binds the
/// operation kind, the sorted input ids, the output content hash and the
/// request hash, so any of those changing yields a different record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OperationRecord")]
pub struct Operation {
    id: OperationId,
    kind: OperationKind,
    inputs: Vec<GridId>,
    output: GridId,
    output_content_hash: ContentHash,
    request_hash: ContentHash,
    backend: BackendDescriptor,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OperationRecord {
    id: OperationId,
    kind: OperationKind,
    inputs: Vec<GridId>,
    output: GridId,
    output_content_hash: ContentHash,
    request_hash: ContentHash,
    backend: BackendDescriptor,
    timestamp: DateTime<Utc>,
}

impl TryFrom<OperationRecord> for Operation {
    type Error = ModelError;

    fn try_from(r: OperationRecord) -> Result<Self, Self::Error> {
        let op = Self {
            id: r.id,
            kind: r.kind,
            inputs: r.inputs,
            output: r.output,
            output_content_hash: r.output_content_hash,
            request_hash: r.request_hash,
            backend: r.backend,
            timestamp: r.timestamp,
        };
        op.verify()?;
        Ok(op)
    }
}

impl Operation {
    /// Record `kind` applied to `inputs` (semantic order) producing `output`
    ///
    /// # Errors
    /// Returns [`ModelError::OperationArity`] if the input count does not
    /// match the operation kind
    pub fn new(
        kind: OperationKind,
        inputs: Vec<GridId>,
        output: &Grid,
        request_hash: ContentHash,
        backend: BackendDescriptor,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        if inputs.len() != kind.arity() {
            return Err(ModelError::OperationArity {
                kind,
                expected: kind.arity(),
                actual: inputs.len(),
            });
        }
        Ok(Self {
            id: operation_id(kind, &inputs, output.content_hash(), &request_hash),
            kind,
            inputs,
            output: output.id().clone(),
            output_content_hash: *output.content_hash(),
            request_hash,
            backend,
            timestamp,
        })
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Input ids in the order the resolver received them
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[GridId] {
        &self.inputs
    }

    #[inline]
    #[must_use]
    pub fn output(&self) -> &GridId {
        &self.output
    }

    #[inline]
    #[must_use]
    pub fn output_content_hash(&self) -> &ContentHash {
        &self.output_content_hash
    }

    #[inline]
    #[must_use]
    pub fn request_hash(&self) -> &ContentHash {
        &self.request_hash
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &BackendDescriptor {
        &self.backend
    }

    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// True if this record describes `grid` as it exists now
    #[must_use]
    pub fn produced(&self, grid: &Grid) -> bool {
        &self.output == grid.id() && &self.output_content_hash == grid.content_hash()
    }

    /// Recompute the id from the recorded fields
    ///
    /// # Errors
    /// Returns [`ModelError::OperationArity`] or [`ModelError::OperationIdMismatch`]
    pub fn verify(&self) -> Result<(), ModelError> {
        if self.inputs.len() != self.kind.arity() {
            return Err(ModelError::OperationArity {
                kind: self.kind,
                expected: self.kind.arity(),
                actual: self.inputs.len(),
            });
        }
        let expected = operation_id(
            self.kind,
            &self.inputs,
            &self.output_content_hash,
            &self.request_hash,
        );
        if expected != self.id {
            return Err(ModelError::OperationIdMismatch {
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

    /// Parse and verify a record produced by [`to_record`](Self::to_record)
    ///
    /// # Errors
    /// Returns error on malformed records or a mismatched id
    pub fn parse(record: &serde_json::Value) -> Result<Self, ModelError> {
        Ok(Self::deserialize(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{matrix_id, thread_id};
    use crate::kind::GridKind;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fixture() -> (Vec<GridId>, Grid) {
        let thread = thread_id("u", "s", "t");
        let inputs = vec![
            matrix_id(GridKind::A, &thread, 1),
            matrix_id(GridKind::B, &thread, 1),
        ];
        let output = Grid::builder(GridKind::C)
            .thread(thread)
            .row(["x * y"])
            .build()
            .unwrap();
        (inputs, output)
    }

    fn op(inputs: Vec<GridId>, output: &Grid) -> Operation {
        Operation::new(
            OperationKind::Combine,
            inputs,
            output,
            ContentHash::compute(b"request"),
            BackendDescriptor::new("synthetic", "echo").with_version("1"),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn id_is_independent_of_input_order() {
        let (inputs, output) = fixture();
        let mut reversed = inputs.clone();
        reversed.reverse();
        let forward = op(inputs, &output);
        let backward = op(reversed, &output);
        assert_eq!(forward.id(), backward.id());
        assert_ne!(forward.inputs(), backward.inputs());
        assert!(forward.produced(&output));
    }

    #[test]
    fn arity_is_checked() {
        let (inputs, output) = fixture();
        let result = Operation::new(
            OperationKind::Interpret,
            inputs,
            &output,
            ContentHash::default(),
            BackendDescriptor::new("synthetic", "echo"),
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(ModelError::OperationArity {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn record_round_trip() {
        let (inputs, output) = fixture();
        let op = op(inputs, &output);
        let record = op.to_record().unwrap();
        assert_eq!(record["kind"], "*");
        assert_eq!(record["backend"]["vendor"], "synthetic");
        assert_eq!(Operation::parse(&record).unwrap(), op);
    }

    #[test]
    fn tampered_request_hash_is_rejected() {
        let (inputs, output) = fixture();
        let mut record = op(inputs, &output).to_record().unwrap();
        record["request_hash"] = ContentHash::compute(b"other").to_string().into();
        assert!(matches!(
            Operation::parse(&record),
            Err(ModelError::Parse(_))
        ));
    }

    #[test]
    fn backend_display() {
        let backend = BackendDescriptor::new("openai", "gpt-4o").with_version("2024-08");
        assert_eq!(backend.to_string(), "openai/gpt-4o@2024-08");
    }
}
