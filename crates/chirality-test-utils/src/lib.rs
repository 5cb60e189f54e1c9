//! Testing utilities for the chirality workspace
//!
//! Shared fixtures (threads, fixed clocks, grids) and instrumented resolvers.

#![allow(missing_docs)]

use chirality_algebra::{RawGrid, ResolutionError, ResolveRequest, Resolver, SyntheticResolver};
use chirality_core::{ids, BackendDescriptor, Grid, GridKind, OperationKind, ThreadId};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Fixed instant used wherever a test needs a timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Deterministic thread for `session`
pub fn test_thread(session: &str) -> ThreadId {
    ids::thread_id("tester", session, "2025-01-01T00:00:00Z")
}

/// Grid of `kind` from literal rows
pub fn grid(kind: GridKind, thread: &ThreadId, rows: &[&[&str]]) -> Grid {
    Grid::builder(kind)
        .thread(thread.clone())
        .rows(rows.iter().map(|r| r.iter().copied()))
        .build()
        .unwrap()
}

/// `rows x cols` grid whose cells read `K[r,c]`
pub fn labelled_grid(kind: GridKind, thread: &ThreadId, rows: usize, cols: usize) -> Grid {
    Grid::builder(kind)
        .thread(thread.clone())
        .rows((0..rows).map(|r| (0..cols).map(move |c| format!("{kind}[{r},{c}]"))))
        .build()
        .unwrap()
}

/// Wraps a resolver and counts calls per operation kind
#[derive(Debug, Default)]
pub struct CountingResolver<R = SyntheticResolver> {
    inner: R,
    calls: AtomicUsize,
    kinds: Mutex<Vec<OperationKind>>,
}

impl<R: Resolver> CountingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            kinds: Mutex::new(Vec::new()),
        }
    }

    /// Number of `resolve` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Kinds resolved, in call order
    pub fn kinds(&self) -> Vec<OperationKind> {
        self.kinds.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl<R: Resolver> Resolver for CountingResolver<R> {
    async fn resolve(
        &self,
        kind: OperationKind,
        inputs: &[&Grid],
        request: &ResolveRequest,
    ) -> Result<RawGrid, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.kinds.lock().unwrap().push(kind);
        self.inner.resolve(kind, inputs, request).await
    }

    fn backend(&self) -> BackendDescriptor {
        self.inner.backend()
    }
}

/// Returns the same canned result for every request
#[derive(Debug, Clone)]
pub struct CannedResolver {
    result: Result<RawGrid, ResolutionError>,
}

impl CannedResolver {
    /// Always answer with `values`
    pub fn values(values: &[&[&str]]) -> Self {
        Self {
            result: Ok(values
                .iter()
                .map(|r| r.iter().map(|v| (*v).to_string()).collect())
                .collect()),
        }
    }

    /// Always fail with `error`
    pub fn failing(error: ResolutionError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait::async_trait]
impl Resolver for CannedResolver {
    async fn resolve(
        &self,
        _kind: OperationKind,
        _inputs: &[&Grid],
        _request: &ResolveRequest,
    ) -> Result<RawGrid, ResolutionError> {
        self.result.clone()
    }

    fn backend(&self) -> BackendDescriptor {
        BackendDescriptor::new("test", "canned")
    }
}
