//! Canonical resolver requests
//!
//! A request carries the operation kind, a kind-specific instruction, a
//! payload describing input kinds and shapes, and the ambient context. Cell
//! values are not part of it; resolvers read them from the input grids. The
//! request hash binds an [`Operation`](chirality_core::Operation) to exactly
//! what was asked.

use chirality_core::{
    canonicalize, ContentHash, Dimensions, EncodingError, Grid, GridKind, OperationKind, ThreadId,
};
use serde::{Deserialize, Serialize};

/// Instruction sent as the system message for `kind`
#[must_use]
pub fn system_instruction(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Combine => {
            "Semantic multiplication (*) intersects the meanings of a row of the left grid \
             with a column of the right grid while preserving identities. Return a JSON object \
             with 'shape' [rows, cols] and 'cells' as a 2D array of strings."
        }
        OperationKind::Merge => {
            "Semantic addition (+) combines corresponding cells precisely, preserving source \
             identities. Return a JSON object with 'shape' and 'cells', same shape as the inputs."
        }
        OperationKind::Elementwise => {
            "Element-wise multiplication (⊙) combines corresponding cells. Return a JSON object \
             with 'shape' and 'cells', same shape as the inputs."
        }
        OperationKind::Interpret => {
            "Interpret the grid for human understanding. Preserve dimensions and indices; \
             rewrite values only. Return a JSON object with 'shape' and 'cells'."
        }
        OperationKind::Expand => {
            "Cross product (×) expands relational possibilities: each output cell pairs one \
             cell of the left grid with one cell of the right grid. Return a JSON object with \
             'shape' set to the target shape and 'cells'."
        }
    }
}

/// Kind and shape of one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub kind: GridKind,
    pub shape: Dimensions,
}

/// User-level payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// e.g. `C = A * B`
    pub task: String,
    /// Inputs in semantic order
    pub inputs: Vec<InputShape>,
    pub target_shape: Dimensions,
}

/// Ambient context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub thread: ThreadId,
    pub station: String,
}

/// Everything a resolver is asked for one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub kind: OperationKind,
    pub system: String,
    pub user: RequestPayload,
    pub context: RequestContext,
}

fn task(kind: OperationKind, inputs: &[&Grid], output: GridKind) -> String {
    match inputs {
        [only] => format!("{output} = {}({})", kind.symbol(), only.kind()),
        [left, right] => format!("{output} = {} {} {}", left.kind(), kind.symbol(), right.kind()),
        _ => format!("{output} = {}", kind.symbol()),
    }
}

impl ResolveRequest {
    /// Build the request for `kind` over validated `inputs`
    #[must_use]
    pub fn build(
        kind: OperationKind,
        inputs: &[&Grid],
        target_shape: Dimensions,
        output_kind: GridKind,
        thread: &ThreadId,
        station: &str,
    ) -> Self {
        Self {
            kind,
            system: system_instruction(kind).to_string(),
            user: RequestPayload {
                task: task(kind, inputs, output_kind),
                inputs: inputs
                    .iter()
                    .map(|g| InputShape {
                        kind: g.kind(),
                        shape: g.dimensions(),
                    })
                    .collect(),
                target_shape,
            },
            context: RequestContext {
                thread: thread.clone(),
                station: station.to_string(),
            },
        }
    }

    /// Canonical form of the whole request
    ///
    /// # Errors
    /// Returns error if the request cannot be canonicalized
    pub fn canonical(&self) -> Result<String, EncodingError> {
        canonicalize(self)
    }

    /// Hash of [`canonical`](Self::canonical)
    ///
    /// # Errors
    /// Returns error if the request cannot be canonicalized
    pub fn hash(&self) -> Result<ContentHash, EncodingError> {
        Ok(ContentHash::of_canonical(&self.canonical()?))
    }

    /// Canonical user payload, suitable as a user message
    ///
    /// # Errors
    /// Returns error if the payload cannot be canonicalized
    pub fn user_message(&self) -> Result<String, EncodingError> {
        canonicalize(&self.user)
    }
}
