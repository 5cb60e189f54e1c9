//! Standard station pipeline
//!
//! From axiom grid `A` and basis grid `B`:
//! `C = A * B`, `J = interpret(B)`, `F = J ⊙ C`, `D = A + F`, `W = A × B`.
//! `C`, `J` and `W` only depend on the inputs and are resolved concurrently;
//! the operation log keeps the order above.

use crate::context::OperationContext;
use crate::error::AlgebraError;
use crate::ops::Algebra;
use chirality_core::{Grid, Operation, Tensor, ThreadId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Name of the tensor stacking `C`, `F` and `D`
pub const TENSOR_NAME: &str = "CFD";

/// Everything one pipeline run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRun {
    pub c: Grid,
    pub j: Grid,
    pub f: Grid,
    pub d: Grid,
    pub w: Grid,
    /// Operations in execution order
    pub operations: Vec<Operation>,
    /// `C`, `F` and `D` stacked in that order
    pub tensor: Tensor,
}

/// Runs the standard stations over one algebra
#[derive(Debug, Clone)]
pub struct Pipeline {
    algebra: Algebra,
}

impl Pipeline {
    #[inline]
    #[must_use]
    pub fn new(algebra: Algebra) -> Self {
        Self { algebra }
    }

    /// Run every station for `a` and `b` under `thread`
    ///
    /// All outputs carry `timestamp`, so a run is reproducible from its
    /// inputs. `F = J ⊙ C` needs `B` and `C` to share a shape and
    /// `D = A + F` needs `A` to match as well; other inputs fail validation
    /// at the first incompatible step.
    ///
    /// # Errors
    /// Returns the first [`AlgebraError`]; no partial run is returned
    pub async fn run(
        &self,
        a: &Grid,
        b: &Grid,
        thread: &ThreadId,
        timestamp: DateTime<Utc>,
    ) -> Result<PipelineRun, AlgebraError> {
        let ctx = OperationContext::new(thread.clone(), timestamp);
        info!(thread = %thread, a = %a.id(), b = %b.id(), "pipeline started");

        let ((c, op_c), (j, op_j), (w, op_w)) = tokio::try_join!(
            self.algebra.combine(a, b, &ctx),
            self.algebra.interpret(b, &ctx),
            self.algebra.expand(a, b, &ctx),
        )?;
        let (f, op_f) = self.algebra.elementwise(&j, &c, &ctx).await?;
        let (d, op_d) = self.algebra.merge(a, &f, &ctx).await?;

        let tensor = Tensor::new(
            TENSOR_NAME,
            thread,
            1,
            vec![c.clone(), f.clone(), d.clone()],
        )?;

        info!(thread = %thread, tensor = %tensor.id(), "pipeline finished");
        Ok(PipelineRun {
            c,
            j,
            f,
            d,
            w,
            operations: vec![op_c, op_j, op_f, op_d, op_w],
            tensor,
        })
    }
}
