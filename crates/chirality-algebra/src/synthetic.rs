//! Deterministic resolver with no external dependencies
//!
//! Output values are a pure function of the operation kind and the texts of
//! the contributing input cells. Ids, thread and station never influence
//! them, so identical content always resolves identically.

use crate::error::ResolutionError;
use crate::ops::contributing_cells;
use crate::request::ResolveRequest;
use crate::resolver::{RawGrid, Resolver};
use chirality_core::{BackendDescriptor, Cell, Grid, OperationKind, VERSION};

/// Value for an empty dot product
pub const EMPTY_SUM: &str = "∅";

/// Reference resolver; never blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticResolver;

impl SyntheticResolver {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Value synthesized from the contributing cells of one output position
    #[must_use]
    pub fn value(kind: OperationKind, sources: &[&Cell]) -> String {
        let text = |i: usize| sources.get(i).map_or("", |c| c.text());
        match kind {
            OperationKind::Combine => {
                let (left, right) = sources.split_at(sources.len() / 2);
                if left.is_empty() {
                    return EMPTY_SUM.to_string();
                }
                left.iter()
                    .zip(right)
                    .map(|(a, b)| format!("{} * {}", a.text(), b.text()))
                    .collect::<Vec<_>>()
                    .join(" + ")
            }
            OperationKind::Interpret => format!("interpret({})", text(0)),
            OperationKind::Merge | OperationKind::Elementwise | OperationKind::Expand => {
                format!("{} {} {}", text(0), kind.symbol(), text(1))
            }
        }
    }
}

#[async_trait::async_trait]
impl Resolver for SyntheticResolver {
    async fn resolve(
        &self,
        kind: OperationKind,
        inputs: &[&Grid],
        request: &ResolveRequest,
    ) -> Result<RawGrid, ResolutionError> {
        let shape = request.user.target_shape;
        Ok((0..shape.rows)
            .map(|r| {
                (0..shape.cols)
                    .map(|c| Self::value(kind, &contributing_cells(kind, inputs, r, c)))
                    .collect()
            })
            .collect())
    }

    fn backend(&self) -> BackendDescriptor {
        BackendDescriptor::new("synthetic", "reference").with_version(VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirality_core::ids::{matrix_id, thread_id};
    use chirality_core::{CellContent, GridKind};

    fn cell(text: &str) -> Cell {
        let grid = matrix_id(GridKind::A, &thread_id("u", "s", "t"), 1);
        Cell::new(&grid, 0, 0, CellContent::text(text)).unwrap()
    }

    #[test]
    fn values_per_kind() {
        let (a, b) = (cell("x"), cell("y"));
        let pair = [&a, &b];
        assert_eq!(SyntheticResolver::value(OperationKind::Merge, &pair), "x + y");
        assert_eq!(SyntheticResolver::value(OperationKind::Elementwise, &pair), "x ⊙ y");
        assert_eq!(SyntheticResolver::value(OperationKind::Expand, &pair), "x × y");
        assert_eq!(SyntheticResolver::value(OperationKind::Combine, &pair), "x * y");
        assert_eq!(SyntheticResolver::value(OperationKind::Interpret, &[&b]), "interpret(y)");
    }

    #[test]
    fn combine_sums_pairwise_products() {
        let cells: Vec<_> = ["a1", "a2", "b1", "b2"].into_iter().map(cell).collect();
        let refs: Vec<_> = cells.iter().collect();
        assert_eq!(
            SyntheticResolver::value(OperationKind::Combine, &refs),
            "a1 * b1 + a2 * b2"
        );
        assert_eq!(SyntheticResolver::value(OperationKind::Combine, &[]), EMPTY_SUM);
    }

    #[test]
    fn backend_is_versioned() {
        let backend = SyntheticResolver.backend();
        assert_eq!(backend.vendor, "synthetic");
        assert_eq!(backend.version.as_deref(), Some(VERSION));
    }
}
