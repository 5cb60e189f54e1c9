//! Chirality algebra
//!
//! The five operations over semantic grids, resolved through a pluggable
//! backend.
//!
//! # Core Concepts
//!
//! - [`Resolver`]: backend contract, returns raw values of an exact shape
//! - [`Algebra`]: validate, build request, resolve, materialize, record provenance
//! - [`SyntheticResolver`]: deterministic reference backend
//! - [`CachedResolver`]: content-keyed moka cache in front of any resolver
//! - [`Pipeline`]: the standard station sequence
//!
//! # Example
//!
//! ```rust,ignore
//! let algebra = Algebra::new(Arc::new(SyntheticResolver));
//! let ctx = OperationContext::new(thread, timestamp);
//! let (c, op) = algebra.combine(&a, &b, &ctx).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod context;
mod error;
mod ops;
mod pipeline;
mod request;
mod resolver;
mod synthetic;

pub use cache::{cache_key, CacheStats, CachedResolver};
pub use context::OperationContext;
pub use error::{AlgebraError, ResolutionError};
pub use ops::{contributing_cells, default_output_kind, Algebra};
pub use pipeline::{Pipeline, PipelineRun, TENSOR_NAME};
pub use request::{
    system_instruction, InputShape, RequestContext, RequestPayload, ResolveRequest,
};
pub use resolver::{RawGrid, Resolver};
pub use synthetic::{SyntheticResolver, EMPTY_SUM};
