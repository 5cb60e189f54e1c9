//! Resolver contract
//!
//! A resolver turns a validated request into a rectangular grid of raw
//! strings. The shape is fixed by the operation kind and the inputs; the
//! algebra rejects anything else, so implementations must never reshape,
//! pad or truncate.

use crate::error::ResolutionError;
use crate::request::ResolveRequest;
use chirality_core::{BackendDescriptor, Grid, OperationKind};
use std::fmt::Debug;
use std::sync::Arc;

/// Raw resolver output, row-major
pub type RawGrid = Vec<Vec<String>>;

/// Pluggable backend computing raw output values
///
/// `inputs` arrive in semantic order (`[A, B]` for `A * B`).
#[async_trait::async_trait]
pub trait Resolver: Send + Sync + Debug {
    /// Resolve one operation
    async fn resolve(
        &self,
        kind: OperationKind,
        inputs: &[&Grid],
        request: &ResolveRequest,
    ) -> Result<RawGrid, ResolutionError>;

    /// Descriptor recorded on every operation this resolver serves
    fn backend(&self) -> BackendDescriptor;
}

#[async_trait::async_trait]
impl<R> Resolver for Arc<R>
where
    R: Resolver + ?Sized,
{
    async fn resolve(
        &self,
        kind: OperationKind,
        inputs: &[&Grid],
        request: &ResolveRequest,
    ) -> Result<RawGrid, ResolutionError> {
        (**self).resolve(kind, inputs, request).await
    }

    fn backend(&self) -> BackendDescriptor {
        (**self).backend()
    }
}
