//! Construction by several workers sharing an in-process communicator.

use gbm_dmatrix::prelude::*;
use ndarray::Array2;
use std::thread;

mod common;
use common::*;

/// Run `work` once per worker on its own thread and collect the results by rank.
fn run_workers<T, F>(world_size: usize, work: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(InMemoryCommunicator) -> T + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = InMemoryCommunicator::group(world_size)
        .into_iter()
        .map(|comm| {
            let work = work.clone();
            thread::spawn(move || work(comm))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn block(rows: usize, cols: usize, rank: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| (rank * 100 + r * 10 + c) as f32)
}

#[test]
fn test_column_split_shifts_feature_indices() {
    let widths = [2usize, 3, 1];
    let results = run_workers(3, move |comm| {
        let rank = comm.rank();
        let features = block(4, widths[rank], rank);
        let mut adapter = DenseAdapter::new(features.view());
        let dmat =
            SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, 1, DataSplitMode::Col, &comm).unwrap();
        (dmat.info().num_col, dmat.info().data_split_mode, triplets(&dmat))
    });

    let offsets = [0u32, 2, 5];
    for (rank, (num_col, mode, entries)) in results.into_iter().enumerate() {
        assert_eq!(num_col, 6);
        assert_eq!(mode, DataSplitMode::Col);
        assert_eq!(entries.len(), 4 * widths[rank]);
        for (row, col, value) in entries {
            let local = col - offsets[rank];
            assert!((local as usize) < widths[rank]);
            assert_eq!(value, (rank * 100 + row * 10 + local as usize) as f32);
        }
    }
}

#[test]
fn test_row_split_takes_widest_worker() {
    let widths = [2usize, 4];
    let results = run_workers(2, move |comm| {
        let rank = comm.rank();
        let features = block(3, widths[rank], rank);
        let mut adapter = DenseAdapter::new(features.view());
        let dmat =
            SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, 1, DataSplitMode::Row, &comm).unwrap();
        (dmat.info().num_col, triplets(&dmat))
    });

    assert_eq!(results[0].0, 4);
    assert_eq!(results[1].0, 4);
    // indices are never shifted for a row split
    assert!(results[0].1.iter().all(|&(_, c, _)| c < 2));
}

#[test]
fn test_row_split_rejects_different_categories() {
    let results = run_workers(2, |comm| {
        let rank = comm.rank();
        let codes = [0i32, 1, 1];
        let names: Vec<String> = if rank == 0 {
            vec!["a".into(), "b".into()]
        } else {
            vec!["a".into(), "c".into()]
        };
        let mut adapter = ColumnarAdapter::new(vec![Column::Categorical {
            codes: &codes,
            categories: &names,
        }])
        .unwrap();
        SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, 1, DataSplitMode::Row, &comm)
            .map(|dmat| dmat.info().num_row)
    });

    assert_eq!(results[0].as_ref().ok(), Some(&3));
    assert!(matches!(
        results[1],
        Err(DMatrixError::InconsistentAcrossWorkers { .. })
    ));
}

#[test]
fn test_row_split_accepts_matching_categories() {
    let results = run_workers(3, |comm| {
        let codes = [comm.rank() as i32 % 2, 1];
        let names: Vec<String> = vec!["x".into(), "y".into()];
        let mut adapter = ColumnarAdapter::new(vec![Column::Categorical {
            codes: &codes,
            categories: &names,
        }])
        .unwrap();
        SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, 1, DataSplitMode::Row, &comm)
            .map(|dmat| dmat.info().has_categorical())
    });
    assert!(results.into_iter().all(|r| matches!(r, Ok(true))));
}

#[test]
fn test_batch_param_agreement() {
    let agreed = run_workers(2, |comm| BatchParam::new(64, 0.2).validate_across_workers(&comm));
    assert!(agreed.iter().all(Result::is_ok));

    let disagreed = run_workers(2, |comm| {
        let max_bin = if comm.rank() == 0 { 64 } else { 128 };
        BatchParam::new(max_bin, 0.2).validate_across_workers(&comm)
    });
    assert!(disagreed[0].is_ok());
    assert!(matches!(
        disagreed[1],
        Err(DMatrixError::InconsistentAcrossWorkers { .. })
    ));
}

#[test]
fn test_single_worker_needs_no_exchange() {
    let dmat = example_dmatrix();
    assert_eq!(dmat.info().num_col, 4);
    assert!(BatchParam::new(8, 0.2).validate_across_workers(&NoopCommunicator).is_ok());
}
