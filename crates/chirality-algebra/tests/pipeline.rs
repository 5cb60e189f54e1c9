//! End-to-end runs of the standard station pipeline.

use chirality_algebra::{Algebra, AlgebraError, Pipeline, SyntheticResolver, TENSOR_NAME};
use chirality_core::{ids, GridKind, OperationKind, StationType, Tensor};
use chirality_test_utils::{fixed_timestamp, labelled_grid, test_thread, CountingResolver};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn pipeline_produces_every_grid_and_logs_in_order() {
    let thread = test_thread("pipeline");
    let a = labelled_grid(GridKind::A, &thread, 2, 2);
    let b = labelled_grid(GridKind::B, &thread, 2, 2);
    let counting = Arc::new(CountingResolver::new(SyntheticResolver));
    let pipeline = Pipeline::new(Algebra::new(counting.clone()));

    let run = pipeline
        .run(&a, &b, &thread, fixed_timestamp())
        .await
        .unwrap();

    let kinds: Vec<_> = run.operations.iter().map(|op| op.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Combine,
            OperationKind::Interpret,
            OperationKind::Elementwise,
            OperationKind::Merge,
            OperationKind::Expand,
        ]
    );
    assert_eq!(counting.calls(), 5);

    assert_eq!(run.c.kind(), GridKind::C);
    assert_eq!(run.j.kind(), GridKind::J);
    assert_eq!(run.f.kind(), GridKind::F);
    assert_eq!(run.d.kind(), GridKind::D);
    assert_eq!(run.w.kind(), GridKind::W);
    assert_eq!(run.w.rows(), 4);

    assert_eq!(
        run.f.metadata().station.as_deref(),
        Some(StationType::S3.label())
    );
    assert_eq!(
        run.w.metadata().station.as_deref(),
        Some(StationType::S4.label())
    );

    // F = J ⊙ C and D = A + F chain through their inputs
    assert_eq!(run.operations[2].inputs(), &[run.j.id().clone(), run.c.id().clone()]);
    assert_eq!(run.operations[3].inputs(), &[a.id().clone(), run.f.id().clone()]);
    assert_eq!(
        run.d.get(0, 0).unwrap().text(),
        "A[0,0] + interpret(B[0,0]) ⊙ A[0,0] * B[0,0] + A[0,1] * B[1,0]"
    );

    assert_eq!(run.tensor.depth(), 3);
    assert_eq!(run.tensor.id(), &ids::tensor_id(TENSOR_NAME, &thread, 1));
    let layer_ids: Vec<_> = run.tensor.layers().iter().map(|g| g.id().clone()).collect();
    assert_eq!(layer_ids, vec![run.c.id().clone(), run.f.id().clone(), run.d.id().clone()]);

    let record = run.tensor.to_record().unwrap();
    assert_eq!(Tensor::parse(&record).unwrap(), run.tensor);
}

#[tokio::test]
async fn pipeline_is_reproducible() {
    let thread = test_thread("repro");
    let a = labelled_grid(GridKind::A, &thread, 1, 1);
    let b = labelled_grid(GridKind::B, &thread, 1, 1);
    let pipeline = Pipeline::new(Algebra::new(Arc::new(SyntheticResolver)));

    let first = pipeline.run(&a, &b, &thread, fixed_timestamp()).await.unwrap();
    let second = pipeline.run(&a, &b, &thread, fixed_timestamp()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn incompatible_axioms_stop_the_run() {
    let thread = test_thread("mismatch");
    let a = labelled_grid(GridKind::A, &thread, 2, 3);
    let b = labelled_grid(GridKind::B, &thread, 3, 3);
    let pipeline = Pipeline::new(Algebra::new(Arc::new(SyntheticResolver)));

    // C is 2x3 but J is 3x3, so F = J ⊙ C fails validation
    let err = pipeline
        .run(&a, &b, &thread, fixed_timestamp())
        .await
        .unwrap_err();
    assert!(matches!(err, AlgebraError::Validation(_)));
}
