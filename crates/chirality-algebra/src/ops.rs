//! The five operations
//!
//! Every invocation runs the same steps and either returns a complete
//! `(Grid, Operation)` pair or an error:
//! 1. validate input shapes and the output's positional id
//! 2. build and hash the canonical request
//! 3. resolve raw values
//! 4. check the raw shape and materialize the output grid
//! 5. record provenance

use crate::context::OperationContext;
use crate::error::{AlgebraError, ResolutionError};
use crate::request::ResolveRequest;
use crate::resolver::{RawGrid, Resolver};
use chirality_core::{
    ids, validation, Cell, CellDraft, CellProvenance, Dimensions, Grid, GridKind, Operation,
    OperationKind, StationType,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output kind used when the context does not name one
#[must_use]
pub const fn default_output_kind(kind: OperationKind) -> GridKind {
    match kind {
        OperationKind::Combine => GridKind::C,
        OperationKind::Merge => GridKind::D,
        OperationKind::Elementwise => GridKind::F,
        OperationKind::Interpret => GridKind::J,
        OperationKind::Expand => GridKind::W,
    }
}

/// Source cells that output cell `(row, col)` derives from
///
/// - combine: row `row` of the left input, then column `col` of the right
/// - merge, elementwise: the aligned cell of each input
/// - interpret: the cell at the same position
/// - expand: `left[row / rows(right)][col / cols(right)]` and
///   `right[row % rows(right)][col % cols(right)]`
///
/// Inputs must already be validated for `kind`; positions outside the
/// output shape yield an empty list.
#[must_use]
pub fn contributing_cells<'g>(
    kind: OperationKind,
    inputs: &[&'g Grid],
    row: usize,
    col: usize,
) -> Vec<&'g Cell> {
    match (kind, inputs) {
        (OperationKind::Combine, &[left, right]) => {
            let left_row = left.row(row).unwrap_or_default();
            let right_col = right.column(col).unwrap_or_default();
            left_row.iter().chain(right_col).collect()
        }
        (OperationKind::Merge | OperationKind::Elementwise, &[left, right]) => {
            left.get(row, col).into_iter().chain(right.get(row, col)).collect()
        }
        (OperationKind::Interpret, &[only]) => only.get(row, col).into_iter().collect(),
        (OperationKind::Expand, &[left, right]) => {
            let (rows, cols) = (right.rows(), right.cols());
            if rows == 0 || cols == 0 {
                return Vec::new();
            }
            left.get(row / rows, col / cols)
                .into_iter()
                .chain(right.get(row % rows, col % cols))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn check_shape(values: &RawGrid, expected: Dimensions) -> Result<(), ResolutionError> {
    if values.len() != expected.rows {
        return Err(ResolutionError::shape(
            expected,
            format!("got {} rows", values.len()),
        ));
    }
    if let Some((row, bad)) = values
        .iter()
        .enumerate()
        .find(|(_, r)| r.len() != expected.cols)
    {
        return Err(ResolutionError::shape(
            expected,
            format!("row {row} has {} columns", bad.len()),
        ));
    }
    Ok(())
}

/// Applies operations through one resolver
#[derive(Debug, Clone)]
pub struct Algebra {
    resolver: Arc<dyn Resolver>,
}

impl Algebra {
    /// Create algebra backed by `resolver`
    #[inline]
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Backing resolver
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// Apply `kind` to `inputs` (semantic order)
    ///
    /// # Errors
    /// - [`AlgebraError::Validation`] before the resolver is called, including
    ///   when the output id equals an input id
    /// - [`AlgebraError::Resolution`] if the resolver fails or mis-shapes
    /// - [`AlgebraError::Encoding`]/[`AlgebraError::Model`] on defective values
    pub async fn apply(
        &self,
        kind: OperationKind,
        inputs: &[&Grid],
        ctx: &OperationContext,
    ) -> Result<(Grid, Operation), AlgebraError> {
        let shape = validation::check(kind, inputs).map_err(|errors| {
            warn!(kind = %kind, %errors, "operation rejected by validation");
            errors
        })?;

        let output_kind = ctx.output_kind.unwrap_or(default_output_kind(kind));
        let output_id = ids::matrix_id(output_kind, &ctx.thread, ctx.sequence);
        validation::check_output_id(&output_id, inputs).map_err(|errors| {
            warn!(kind = %kind, %errors, "operation rejected by validation");
            errors
        })?;
        let station = ctx
            .station
            .clone()
            .unwrap_or_else(|| StationType::for_operation(kind).label().to_string());

        let request =
            ResolveRequest::build(kind, inputs, shape, output_kind, &ctx.thread, &station);
        let request_hash = request.hash()?;
        debug!(kind = %kind, request_hash = %request_hash.short(), "resolving");

        let values = self.resolver.resolve(kind, inputs, &request).await?;
        check_shape(&values, shape)?;

        let mut builder = Grid::builder(output_kind)
            .id(output_id)
            .thread(ctx.thread.clone())
            .sequence(ctx.sequence)
            .station(station)
            .timestamp(ctx.timestamp);
        for (r, row) in values.into_iter().enumerate() {
            builder = builder.row(row.into_iter().enumerate().map(|(c, value)| {
                let sources = contributing_cells(kind, inputs, r, c)
                    .into_iter()
                    .map(|cell| cell.id().clone())
                    .collect();
                CellDraft::from(value).with_provenance(CellProvenance::derived(kind, sources))
            }));
        }
        let output = builder.build()?;

        let operation = Operation::new(
            kind,
            inputs.iter().map(|g| g.id().clone()).collect(),
            &output,
            request_hash,
            self.resolver.backend(),
            ctx.timestamp,
        )?;

        info!(
            kind = %kind,
            output = %output.id(),
            shape = %output.dimensions(),
            operation = %operation.id(),
            "operation applied"
        );
        Ok((output, operation))
    }

    /// `C = A * B`
    ///
    /// # Errors
    /// See [`apply`](Self::apply)
    pub async fn combine(
        &self,
        a: &Grid,
        b: &Grid,
        ctx: &OperationContext,
    ) -> Result<(Grid, Operation), AlgebraError> {
        self.apply(OperationKind::Combine, &[a, b], ctx).await
    }

    /// `D = A + F`
    ///
    /// # Errors
    /// See [`apply`](Self::apply)
    pub async fn merge(
        &self,
        a: &Grid,
        f: &Grid,
        ctx: &OperationContext,
    ) -> Result<(Grid, Operation), AlgebraError> {
        self.apply(OperationKind::Merge, &[a, f], ctx).await
    }

    /// `F = J ⊙ C`
    ///
    /// # Errors
    /// See [`apply`](Self::apply)
    pub async fn elementwise(
        &self,
        j: &Grid,
        c: &Grid,
        ctx: &OperationContext,
    ) -> Result<(Grid, Operation), AlgebraError> {
        self.apply(OperationKind::Elementwise, &[j, c], ctx).await
    }

    /// `J = interpret(B)`
    ///
    /// # Errors
    /// See [`apply`](Self::apply)
    pub async fn interpret(
        &self,
        b: &Grid,
        ctx: &OperationContext,
    ) -> Result<(Grid, Operation), AlgebraError> {
        self.apply(OperationKind::Interpret, &[b], ctx).await
    }

    /// `W = A × B`
    ///
    /// # Errors
    /// See [`apply`](Self::apply)
    pub async fn expand(
        &self,
        a: &Grid,
        b: &Grid,
        ctx: &OperationContext,
    ) -> Result<(Grid, Operation), AlgebraError> {
        self.apply(OperationKind::Expand, &[a, b], ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirality_core::ids::thread_id;

    fn grid(kind: GridKind, rows: usize, cols: usize) -> Grid {
        Grid::builder(kind)
            .thread(thread_id("u", "s", "t"))
            .rows((0..rows).map(|r| (0..cols).map(move |c| format!("{kind}{r}{c}"))))
            .build()
            .unwrap()
    }

    fn texts(cells: &[&Cell]) -> Vec<String> {
        cells.iter().map(|c| c.text().to_string()).collect()
    }

    #[test]
    fn combine_sources_are_row_then_column() {
        let a = grid(GridKind::A, 2, 3);
        let b = grid(GridKind::B, 3, 2);
        let cells = contributing_cells(OperationKind::Combine, &[&a, &b], 1, 0);
        assert_eq!(
            texts(&cells),
            vec!["A10", "A11", "A12", "B00", "B10", "B20"]
        );
    }

    #[test]
    fn expand_sources_follow_block_mapping() {
        let a = grid(GridKind::A, 2, 2);
        let b = grid(GridKind::B, 2, 2);
        let inputs = [&a, &b];
        assert_eq!(
            texts(&contributing_cells(OperationKind::Expand, &inputs, 3, 3)),
            vec!["A11", "B11"]
        );
        assert_eq!(
            texts(&contributing_cells(OperationKind::Expand, &inputs, 0, 2)),
            vec!["A01", "B00"]
        );
    }

    #[test]
    fn expand_with_rectangular_right_input() {
        let a = grid(GridKind::A, 2, 3);
        let b = grid(GridKind::B, 3, 2);
        // output is 6x6; (4, 5) -> A[1][2], B[1][1]
        assert_eq!(
            texts(&contributing_cells(OperationKind::Expand, &[&a, &b], 4, 5)),
            vec!["A12", "B11"]
        );
    }

    #[test]
    fn cellwise_and_interpret_sources() {
        let j = grid(GridKind::J, 2, 2);
        let c = grid(GridKind::C, 2, 2);
        assert_eq!(
            texts(&contributing_cells(OperationKind::Elementwise, &[&j, &c], 0, 1)),
            vec!["J01", "C01"]
        );
        assert_eq!(
            texts(&contributing_cells(OperationKind::Interpret, &[&j], 1, 1)),
            vec!["J11"]
        );
        assert!(contributing_cells(OperationKind::Interpret, &[&j], 5, 5).is_empty());
    }

    #[test]
    fn raw_shape_is_checked_exactly() {
        let expected = Dimensions::new(2, 2);
        let ok = vec![vec!["a".to_string(); 2]; 2];
        assert!(check_shape(&ok, expected).is_ok());

        let short = vec![vec!["a".to_string(); 2]; 1];
        assert!(matches!(
            check_shape(&short, expected),
            Err(ResolutionError::ShapeMismatch { .. })
        ));

        let ragged = vec![vec!["a".to_string(); 2], vec!["a".to_string(); 3]];
        assert!(matches!(
            check_shape(&ragged, expected),
            Err(ResolutionError::ShapeMismatch { detail, .. }) if detail == "row 1 has 3 columns"
        ));
    }

    #[test]
    fn default_output_kinds() {
        assert_eq!(default_output_kind(OperationKind::Combine), GridKind::C);
        assert_eq!(default_output_kind(OperationKind::Expand), GridKind::W);
    }
}
