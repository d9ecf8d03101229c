//! Common fixtures for the gbm-dmatrix integration tests.
#![allow(dead_code)]

use gbm_dmatrix::prelude::*;
use ndarray::Array2;
use rand::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// The 3x4 matrix `[[_, 5, _, _], [_, _, _, _], [2, _, _, 1]]` as CSR parts.
pub fn example_csr() -> (Vec<usize>, Vec<u32>, Vec<f32>) {
    (vec![0, 1, 1, 3], vec![1, 0, 3], vec![5.0, 2.0, 1.0])
}

/// The 3x4 example matrix.
pub fn example_dmatrix() -> SimpleDMatrix {
    let (offset, indices, values) = example_csr();
    let mut adapter = CsrAdapter::new(&offset, &indices, &values, Some(4)).unwrap();
    SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, 1, DataSplitMode::Row, &NoopCommunicator)
        .unwrap()
}

/// Random dense features where roughly `missing_rate` of the cells are NaN.
pub fn random_features(rows: usize, cols: usize, missing_rate: f64, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| {
        if rng.gen_bool(missing_rate) {
            f32::NAN
        } else {
            rng.gen_range(-10.0..10.0)
        }
    })
}

/// Labels derived from the first column, 0 where it is missing.
pub fn labels_for(features: &Array2<f32>) -> Vec<f32> {
    features
        .rows()
        .into_iter()
        .map(|row| if row[0].is_nan() { 0.0 } else { (row[0] > 0.0) as i32 as f32 })
        .collect()
}

/// Matrix built from dense features with labels.
pub fn dense_dmatrix(features: &Array2<f32>, nthread: usize) -> SimpleDMatrix {
    let labels = labels_for(features);
    let mut adapter = DenseAdapter::new(features.view()).with_labels(&labels);
    SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, nthread, DataSplitMode::Row, &NoopCommunicator)
        .unwrap()
}

/// Single threaded host context.
pub fn host_ctx() -> Context {
    Context::new(1).unwrap()
}

/// Write `lines` to `dir/name` and return the path.
pub fn write_text(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Entries of the canonical page as `(row, column, value)` triplets.
pub fn triplets(dmat: &SimpleDMatrix) -> Vec<(usize, u32, f32)> {
    let page = dmat.get_row_batches().next().unwrap();
    page.rows()
        .enumerate()
        .flat_map(|(r, row)| row.iter().map(move |e| (r, e.index, e.fvalue)))
        .collect()
}
