//! Functional tests for the operation algebra.
//!
//! Each scenario runs full invocations (validate, request, resolve,
//! materialize, provenance) against the synthetic resolver or an
//! instrumented one:
//! - Determinism: equal inputs and context give equal grid ids, content
//!   hashes and operation ids.
//! - Positional identity vs content identity across fresh threads.
//! - Exact index mapping for expand.
//! - Validation runs before any resolver call; mis-shaped resolver output is
//!   fatal.
//! - Outputs never take an input's positional id.

use chirality_algebra::{
    Algebra, AlgebraError, CachedResolver, OperationContext, ResolutionError, SyntheticResolver,
};
use chirality_core::{
    ContentHash, Dimensions, Grid, GridKind, Operation, OperationKind, StationType,
    ValidationError,
};
use chirality_test_utils::{
    fixed_timestamp, grid, labelled_grid, test_thread, CannedResolver, CountingResolver,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn synthetic() -> Algebra {
    Algebra::new(Arc::new(SyntheticResolver))
}

fn ctx(session: &str) -> OperationContext {
    OperationContext::new(test_thread(session), fixed_timestamp())
}

/// Text of the source cells recorded in an output cell's provenance
fn source_texts(output: &Grid, row: usize, col: usize, inputs: &[&Grid]) -> Vec<String> {
    output
        .get(row, col)
        .unwrap()
        .provenance()
        .derived_from
        .iter()
        .map(|id| {
            inputs
                .iter()
                .flat_map(|g| g.cells())
                .find(|c| c.id() == id)
                .map(|c| c.text().to_string())
                .unwrap()
        })
        .collect()
}

/// Tenet: the scenario from the operation contract.
///
/// `[["x"]] * [["y"]]` yields a value that depends on "x" and "y" only;
/// re-running under a fresh thread keeps the content hash and changes the
/// grid id.
#[tokio::test]
async fn one_by_one_combine_separates_identity_from_content() {
    let algebra = synthetic();
    let t1 = test_thread("first");
    let (c1, op1) = algebra
        .combine(
            &grid(GridKind::A, &t1, &[&["x"]]),
            &grid(GridKind::B, &t1, &[&["y"]]),
            &ctx("first"),
        )
        .await
        .unwrap();

    assert_eq!(c1.dimensions(), Dimensions::new(1, 1));
    assert_eq!(c1.get(0, 0).unwrap().text(), "x * y");

    let t2 = test_thread("second");
    let (c2, op2) = algebra
        .combine(
            &grid(GridKind::A, &t2, &[&["x"]]),
            &grid(GridKind::B, &t2, &[&["y"]]),
            &ctx("second"),
        )
        .await
        .unwrap();

    assert_eq!(c1.content_hash(), c2.content_hash());
    assert_ne!(c1.id(), c2.id());
    assert_ne!(op1.id(), op2.id());
}

/// Tenet: repeated invocations are indistinguishable.
#[tokio::test]
async fn every_operation_is_deterministic() {
    let algebra = synthetic();
    let thread = test_thread("det");
    let a = labelled_grid(GridKind::A, &thread, 2, 2);
    let b = labelled_grid(GridKind::B, &thread, 2, 2);

    for kind in OperationKind::ALL {
        let inputs: Vec<&Grid> = if kind.arity() == 1 { vec![&b] } else { vec![&a, &b] };
        let (g1, op1) = algebra.apply(kind, &inputs, &ctx("det")).await.unwrap();
        let (g2, op2) = algebra.apply(kind, &inputs, &ctx("det")).await.unwrap();
        assert_eq!(g1.id(), g2.id(), "{kind}");
        assert_eq!(g1.content_hash(), g2.content_hash(), "{kind}");
        assert_eq!(op1.id(), op2.id(), "{kind}");
        assert_eq!(g1, g2, "{kind}");
    }
}

/// Tenet: the expand index law is the block mapping, not interleaving.
#[tokio::test]
async fn expand_follows_block_index_mapping() {
    let thread = test_thread("expand");
    let a = labelled_grid(GridKind::A, &thread, 2, 2);
    let b = labelled_grid(GridKind::B, &thread, 2, 2);
    let (w, _) = synthetic().expand(&a, &b, &ctx("expand")).await.unwrap();

    assert_eq!(w.kind(), GridKind::W);
    assert_eq!(w.dimensions(), Dimensions::new(4, 4));
    assert_eq!(source_texts(&w, 3, 3, &[&a, &b]), vec!["A[1,1]", "B[1,1]"]);
    assert_eq!(source_texts(&w, 0, 2, &[&a, &b]), vec!["A[0,1]", "B[0,0]"]);
    assert_eq!(w.get(0, 2).unwrap().text(), "A[0,1] × B[0,0]");
}

/// Tenet: provenance binds exactly what happened.
#[tokio::test]
async fn operation_record_binds_inputs_output_and_request() {
    let thread = test_thread("prov");
    let a = labelled_grid(GridKind::A, &thread, 2, 3);
    let b = labelled_grid(GridKind::B, &thread, 3, 2);
    let (c, op) = synthetic().combine(&a, &b, &ctx("prov")).await.unwrap();

    assert_eq!(op.kind(), OperationKind::Combine);
    assert_eq!(op.inputs(), &[a.id().clone(), b.id().clone()]);
    assert!(op.produced(&c));
    assert_eq!(op.timestamp(), fixed_timestamp());
    assert_eq!(op.backend().vendor, "synthetic");
    assert!(op.verify().is_ok());

    assert_eq!(c.metadata().station.as_deref(), Some(StationType::S2.label()));
    assert_eq!(c.metadata().timestamp, Some(fixed_timestamp()));
    assert_eq!(
        c.get(1, 1).unwrap().text(),
        "A[1,0] * B[0,1] + A[1,1] * B[1,1] + A[1,2] * B[2,1]"
    );
    assert_eq!(c.get(1, 1).unwrap().provenance().derived_from.len(), 6);

    let record = op.to_record().unwrap();
    assert_eq!(Operation::parse(&record).unwrap(), op);
}

/// Tenet: context overrides reach the output and its identity.
#[tokio::test]
async fn context_overrides_kind_sequence_and_station() {
    let thread = test_thread("override");
    let b = labelled_grid(GridKind::B, &thread, 1, 2);
    let ctx = ctx("override")
        .with_output_kind(GridKind::D)
        .with_sequence(7)
        .with_station("custom");
    let (out, _) = synthetic().interpret(&b, &ctx).await.unwrap();

    assert_eq!(out.kind(), GridKind::D);
    assert_eq!(out.id(), &chirality_core::ids::matrix_id(GridKind::D, &thread, 7));
    assert_eq!(out.metadata().station.as_deref(), Some("custom"));
    assert_eq!(out.metadata().sequence, Some(7));
}

/// Tenet: validation errors surface before any resolver call.
#[tokio::test]
async fn validation_aborts_before_resolving() {
    let counting = Arc::new(CountingResolver::new(SyntheticResolver));
    let algebra = Algebra::new(counting.clone());
    let thread = test_thread("invalid");
    let a = labelled_grid(GridKind::A, &thread, 2, 3);
    let f = labelled_grid(GridKind::F, &thread, 3, 2);

    let err = algebra.merge(&a, &f, &ctx("invalid")).await.unwrap_err();
    assert!(matches!(err, AlgebraError::Validation(_)));
    assert!(!err.is_transient());

    let err = algebra.combine(&a, &a, &ctx("invalid")).await.unwrap_err();
    assert!(matches!(err, AlgebraError::Validation(_)));
    assert_eq!(counting.calls(), 0);

    algebra.combine(&a, &f, &ctx("invalid")).await.unwrap();
    assert_eq!(counting.calls(), 1);
}

/// Tenet: an output never reuses the positional id of one of its inputs.
///
/// Feeding C back into combine at the same thread position would give the
/// new grid C's id while its content differs.
#[tokio::test]
async fn chained_output_cannot_take_an_input_id() {
    let counting = Arc::new(CountingResolver::new(SyntheticResolver));
    let algebra = Algebra::new(counting.clone());
    let thread = test_thread("chain");
    let a = grid(GridKind::A, &thread, &[&["x"]]);
    let b = grid(GridKind::B, &thread, &[&["y"]]);

    let (c, _) = algebra.combine(&a, &b, &ctx("chain")).await.unwrap();
    let err = algebra.combine(&c, &b, &ctx("chain")).await.unwrap_err();
    match err {
        AlgebraError::Validation(errors) => assert_eq!(
            errors.errors(),
            &[ValidationError::OutputIdCollision(c.id().clone())]
        ),
        other => panic!("expected validation error, got {other}"),
    }
    assert_eq!(counting.calls(), 1);

    let next = ctx("chain").with_sequence(2);
    let (c2, op) = algebra.combine(&c, &b, &next).await.unwrap();
    assert_ne!(c2.id(), c.id());
    assert_eq!(c2.get(0, 0).unwrap().text(), "x * y * y");
    assert!(!op.inputs().contains(op.output()));
}

/// Tenet: op ids track inputs, output content and request, not the output
/// grid's position.
#[tokio::test]
async fn operation_id_ignores_output_sequence() {
    let thread = test_thread("seq");
    let a = grid(GridKind::A, &thread, &[&["x"]]);
    let b = grid(GridKind::B, &thread, &[&["y"]]);
    let algebra = synthetic();

    let (first, op1) = algebra.combine(&a, &b, &ctx("seq")).await.unwrap();
    let (second, op2) = algebra
        .combine(&a, &b, &ctx("seq").with_sequence(9))
        .await
        .unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(first.content_hash(), second.content_hash());
    assert_eq!(op1.id(), op2.id());
    assert_ne!(op1.output(), op2.output());
}

/// Tenet: a resolver that mis-shapes its answer fails the whole operation.
#[tokio::test]
async fn misshaped_resolver_output_is_fatal() {
    let thread = test_thread("shape");
    let a = labelled_grid(GridKind::A, &thread, 2, 2);
    let b = labelled_grid(GridKind::B, &thread, 2, 2);

    let short = Algebra::new(Arc::new(CannedResolver::values(&[&["only", "one"]])));
    let err = short.combine(&a, &b, &ctx("shape")).await.unwrap_err();
    assert!(matches!(
        err,
        AlgebraError::Resolution(ResolutionError::ShapeMismatch { expected, .. })
            if expected == Dimensions::new(2, 2)
    ));

    let ragged = Algebra::new(Arc::new(CannedResolver::values(&[&["a", "b"], &["c"]])));
    assert!(ragged.combine(&a, &b, &ctx("shape")).await.is_err());
}

/// Tenet: backend failures propagate untouched and keep their transient class.
#[tokio::test]
async fn resolver_failures_propagate() {
    let thread = test_thread("fail");
    let b = labelled_grid(GridKind::B, &thread, 1, 1);
    let exhausted = Algebra::new(Arc::new(CannedResolver::failing(
        ResolutionError::Exhausted {
            attempts: 3,
            last: "HTTP 503".into(),
        },
    )));
    let err = exhausted.interpret(&b, &ctx("fail")).await.unwrap_err();
    assert!(err.is_transient());
}

/// Tenet: the cache serves content-equal requests without calling the backend.
#[tokio::test]
async fn cache_serves_equal_content_across_threads() {
    let counting = Arc::new(CountingResolver::new(SyntheticResolver));
    let algebra = Algebra::new(Arc::new(CachedResolver::new(counting.clone(), 64)));

    let t1 = test_thread("cache-1");
    let t2 = test_thread("cache-2");
    let (j1, _) = algebra
        .interpret(&labelled_grid(GridKind::B, &t1, 2, 2), &ctx("cache-1"))
        .await
        .unwrap();
    let (j2, _) = algebra
        .interpret(&labelled_grid(GridKind::B, &t2, 2, 2), &ctx("cache-2"))
        .await
        .unwrap();

    assert_eq!(counting.calls(), 1);
    assert_eq!(j1.content_hash(), j2.content_hash());
    assert_ne!(j1.id(), j2.id());

    // provenance still points at this call's own inputs
    assert_ne!(
        j1.get(0, 0).unwrap().provenance().derived_from,
        j2.get(0, 0).unwrap().provenance().derived_from
    );

    // failures are not cached
    let failing = Arc::new(CountingResolver::new(CannedResolver::failing(
        ResolutionError::Rejected("401".into()),
    )));
    let algebra = Algebra::new(Arc::new(CachedResolver::new(failing.clone(), 64)));
    let b = labelled_grid(GridKind::B, &t1, 1, 1);
    assert!(algebra.interpret(&b, &ctx("cache-1")).await.is_err());
    assert!(algebra.interpret(&b, &ctx("cache-1")).await.is_err());
    assert_eq!(failing.calls(), 2);
}

/// Tenet: empty inputs produce empty, valid outputs.
#[tokio::test]
async fn empty_grids_flow_through() {
    let thread = test_thread("empty");
    let empty_a = grid(GridKind::A, &thread, &[]);
    let empty_b = grid(GridKind::B, &thread, &[]);
    let (c, op) = synthetic().combine(&empty_a, &empty_b, &ctx("empty")).await.unwrap();
    assert!(c.is_empty());
    assert_eq!(c.content_hash(), &ContentHash::default());
    assert!(op.verify().is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn output_shapes_follow_the_laws(
        (m, n) in (1usize..4, 1usize..4),
        (p, q) in (1usize..4, 1usize..4),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let thread = test_thread("law");
        let a = labelled_grid(GridKind::A, &thread, m, n);
        let b = labelled_grid(GridKind::B, &thread, n, p);
        let wide = labelled_grid(GridKind::B, &thread, p, q);
        let algebra = synthetic();

        let (c, _) = runtime.block_on(algebra.combine(&a, &b, &ctx("law"))).unwrap();
        prop_assert_eq!(c.dimensions(), Dimensions::new(m, p));

        let (w, _) = runtime.block_on(algebra.expand(&a, &wide, &ctx("law"))).unwrap();
        prop_assert_eq!(w.dimensions(), Dimensions::new(m * p, n * q));

        for r in 0..w.rows() {
            for col in 0..w.cols() {
                let sources = source_texts(&w, r, col, &[&a, &wide]);
                prop_assert_eq!(
                    sources,
                    vec![format!("A[{},{}]", r / p, col / q), format!("B[{},{}]", r % p, col % q)]
                );
            }
        }
    }
}
