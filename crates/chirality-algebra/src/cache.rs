//! Content-keyed resolver cache using moka
//!
//! Keys are the content hash of the operation kind plus the canonical
//! content and shape of every input, so requests with equal content hit the
//! same entry whatever the grid ids, thread or station. Only successful
//! resolutions are stored.

use crate::error::ResolutionError;
use crate::request::ResolveRequest;
use crate::resolver::{RawGrid, Resolver};
use chirality_core::{
    canonicalize, BackendDescriptor, CellContent, ContentHash, Dimensions, Grid, OperationKind,
};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

#[derive(Serialize)]
struct InputKey<'a> {
    shape: Dimensions,
    cells: Vec<&'a CellContent>,
}

#[derive(Serialize)]
struct CacheKey<'a> {
    kind: OperationKind,
    inputs: Vec<InputKey<'a>>,
}

/// Cache key for `kind` over `inputs`
///
/// # Errors
/// Returns error if a cell has no canonical form
pub fn cache_key(kind: OperationKind, inputs: &[&Grid]) -> Result<ContentHash, ResolutionError> {
    let key = CacheKey {
        kind,
        inputs: inputs
            .iter()
            .map(|g| InputKey {
                shape: g.dimensions(),
                cells: g.cells().iter().map(|c| c.content()).collect(),
            })
            .collect(),
    };
    Ok(ContentHash::of_canonical(&canonicalize(&key)?))
}

/// Bounded, approximately least-recently-used cache in front of a resolver
#[derive(Debug, Clone)]
pub struct CachedResolver<R> {
    inner: R,
    cache: Cache<ContentHash, Arc<RawGrid>>,
}

impl<R: Resolver> CachedResolver<R> {
    /// Wrap `inner` with a cache of at most `max_capacity` entries
    #[inline]
    #[must_use]
    pub fn new(inner: R, max_capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(max_capacity),
        }
    }

    /// Wrapped resolver
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics
    ///
    /// Pending maintenance is flushed first so the count is current.
    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        CacheStats {
            entry_count: self.cache.entry_count(),
        }
    }
}

#[async_trait::async_trait]
impl<R: Resolver> Resolver for CachedResolver<R> {
    async fn resolve(
        &self,
        kind: OperationKind,
        inputs: &[&Grid],
        request: &ResolveRequest,
    ) -> Result<RawGrid, ResolutionError> {
        let key = cache_key(kind, inputs)?;

        if let Some(cached) = self.cache.get(&key).await {
            debug!(kind = %kind, key = %key.short(), "resolver cache hit");
            return Ok(cached.as_ref().clone());
        }

        let values = self.inner.resolve(kind, inputs, request).await?;
        self.cache.insert(key, Arc::new(values.clone())).await;
        Ok(values)
    }

    fn backend(&self) -> BackendDescriptor {
        self.inner.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticResolver;
    use chirality_core::ids::thread_id;
    use chirality_core::GridKind;

    fn grid(kind: GridKind, session: &str, rows: &[&[&str]]) -> Grid {
        Grid::builder(kind)
            .thread(thread_id("u", session, "t"))
            .rows(rows.iter().map(|r| r.iter().copied()))
            .build()
            .unwrap()
    }

    #[test]
    fn key_ignores_ids_but_not_shape() {
        let one = grid(GridKind::A, "one", &[&["x", "y"]]);
        let two = grid(GridKind::A, "two", &[&["x", "y"]]);
        let tall = grid(GridKind::A, "one", &[&["x"], &["y"]]);
        let key = cache_key(OperationKind::Interpret, &[&one]).unwrap();
        assert_eq!(key, cache_key(OperationKind::Interpret, &[&two]).unwrap());
        assert_ne!(key, cache_key(OperationKind::Interpret, &[&tall]).unwrap());
        assert_ne!(key, cache_key(OperationKind::Merge, &[&one, &one]).unwrap());
    }

    #[tokio::test]
    async fn hits_are_served_from_cache() {
        let resolver = CachedResolver::new(SyntheticResolver, 16);
        let b = grid(GridKind::B, "one", &[&["y"]]);
        let request = ResolveRequest::build(
            OperationKind::Interpret,
            &[&b],
            b.dimensions(),
            GridKind::J,
            &thread_id("u", "one", "t"),
            "objectives",
        );

        let first = resolver
            .resolve(OperationKind::Interpret, &[&b], &request)
            .await
            .unwrap();
        let second = resolver
            .resolve(OperationKind::Interpret, &[&b], &request)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.stats().await.entry_count, 1);
        assert_eq!(resolver.backend(), SyntheticResolver.backend());
    }
}
