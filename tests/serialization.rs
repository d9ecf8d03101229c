//! Binary save and load.

use gbm_dmatrix::io::binary::{write_dmatrix, write_magic, write_page};
use gbm_dmatrix::prelude::*;
use std::io::Cursor;
use tempfile::tempdir;

mod common;
use common::*;

#[test]
fn test_file_round_trip() {
    let features = random_features(64, 5, 0.25, 17);
    let dmat = dense_dmatrix(&features, 2);
    let dir = tempdir().unwrap();
    let path = dir.path().join("train.dmatrix");

    dmat.save_to_local_file(&path).unwrap();
    let loaded = SimpleDMatrix::load_from_file(&path).unwrap();

    assert_eq!(loaded.info(), dmat.info());
    assert_eq!(triplets(&loaded), triplets(&dmat));
}

#[test]
fn test_round_trip_keeps_categories_and_groups() {
    let values = [0.5f32, 1.5, f32::NAN, 3.5];
    let codes = [1i32, 0, 1, -1];
    let names = vec!["lo".to_string(), "hi".to_string()];
    let labels = [1.0f32, 0.0, 1.0, 0.0];
    let qid = [4u64, 4, 8, 8];
    let mut adapter = ColumnarAdapter::new(vec![
        Column::Numeric(&values),
        Column::Categorical {
            codes: &codes,
            categories: &names,
        },
    ])
    .unwrap()
    .with_labels(&labels)
    .with_qid(&qid);
    let dmat =
        SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, 1, DataSplitMode::Row, &NoopCommunicator)
            .unwrap();

    let mut buffer = Vec::new();
    dmat.save_binary(&mut buffer).unwrap();
    let loaded = SimpleDMatrix::from_reader(&mut Cursor::new(buffer)).unwrap();

    let info = loaded.info();
    assert_eq!(info.group_ptr, vec![0, 2, 4]);
    assert_eq!(info.feature_types, vec![FeatureType::Numerical, FeatureType::Categorical]);
    assert_eq!(info.cats().categories(1), Some(&names[..]));
    assert_eq!(info.num_nonzero, dmat.info().num_nonzero);
}

#[test]
fn test_derived_pages_are_not_saved() {
    let dmat = example_dmatrix();
    let ctx = host_ctx();
    dmat.get_column_batches(&ctx).unwrap();
    dmat.get_gradient_index(&ctx, &BatchParam::new(8, 0.2)).unwrap();

    let mut buffer = Vec::new();
    dmat.save_binary(&mut buffer).unwrap();
    let loaded = SimpleDMatrix::from_reader(&mut Cursor::new(buffer)).unwrap();

    assert!(!loaded.column_page_exists());
    assert!(!loaded.gradient_index_exists());
    assert_eq!(loaded.build_counts().column, 0);
    let csc = loaded.get_column_batches(&ctx).unwrap().next().unwrap();
    assert_eq!(csc.offset, vec![0, 1, 2, 2, 3]);
}

#[test]
fn test_wrong_magic_is_rejected() {
    let dmat = example_dmatrix();
    let mut buffer = Vec::new();
    dmat.save_binary(&mut buffer).unwrap();
    buffer[0] ^= 0xff;
    match SimpleDMatrix::from_reader(&mut Cursor::new(buffer)) {
        Err(DMatrixError::MagicMismatch { expected, .. }) => {
            assert_eq!(expected, gbm_dmatrix::BINARY_MAGIC);
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let err = SimpleDMatrix::load_from_file(dir.path().join("absent.dmatrix")).unwrap_err();
    assert!(matches!(err, DMatrixError::IO { .. }));
}

#[test]
fn test_legacy_meta_loads() {
    let dmat = example_dmatrix();
    let page = dmat.get_row_batches().next().unwrap();

    let mut buffer = Vec::new();
    write_magic(&mut buffer).unwrap();
    dmat.info().save_binary_legacy(&mut buffer).unwrap();
    write_page(&mut buffer, &page).unwrap();

    let loaded = SimpleDMatrix::from_reader(&mut Cursor::new(buffer)).unwrap();
    let info = loaded.info();
    assert_eq!((info.num_row, info.num_col, info.num_nonzero), (3, 4, 3));
    assert_eq!(info.data_split_mode, DataSplitMode::Row);
    assert!(info.feature_types.is_empty());
    assert_eq!(triplets(&loaded), triplets(&dmat));
}

#[test]
fn test_unknown_meta_version() {
    let mut buffer = Vec::new();
    write_magic(&mut buffer).unwrap();
    buffer.extend_from_slice(&99u32.to_le_bytes());
    assert!(matches!(
        SimpleDMatrix::from_reader(&mut Cursor::new(buffer)),
        Err(DMatrixError::Serialization { .. })
    ));
}

fn meta(num_row: u64, num_col: u64, num_nonzero: u64) -> MetaInfo {
    let mut info = MetaInfo::new();
    info.num_row = num_row;
    info.num_col = num_col;
    info.num_nonzero = num_nonzero;
    info
}

fn stream(info: &MetaInfo, offset: Vec<u64>, data: Vec<Entry>) -> Vec<u8> {
    let page = SparsePage::from_parts(offset, data).unwrap();
    let mut buffer = Vec::new();
    write_dmatrix(&mut buffer, info, &page).unwrap();
    buffer
}

#[test]
fn test_column_beyond_num_col_is_rejected() {
    let info = meta(1, 2, 1);
    let buffer = stream(&info, vec![0, 1], vec![Entry::new(5, 1.0)]);
    let err = SimpleDMatrix::from_reader(&mut Cursor::new(buffer)).unwrap_err();
    assert!(matches!(err, DMatrixError::Serialization { .. }));
    assert!(!err.is_recoverable());
}

#[test]
fn test_entry_count_mismatch_is_rejected() {
    let info = meta(1, 2, 2);
    let buffer = stream(&info, vec![0, 1], vec![Entry::new(1, 1.0)]);
    assert!(matches!(
        SimpleDMatrix::from_reader(&mut Cursor::new(buffer)),
        Err(DMatrixError::Serialization { .. })
    ));
}

#[test]
fn test_invalid_meta_is_rejected() {
    let mut info = meta(2, 2, 1);
    info.labels = vec![1.0, 0.0, 1.0];
    let buffer = stream(&info, vec![0, 1, 1], vec![Entry::new(0, 1.0)]);
    assert!(matches!(
        SimpleDMatrix::from_reader(&mut Cursor::new(buffer)),
        Err(DMatrixError::MetaInfo { .. })
    ));
}

#[test]
fn test_consistent_stream_builds_quantized_pages() {
    let info = meta(2, 2, 2);
    let buffer = stream(&info, vec![0, 1, 2], vec![Entry::new(1, 1.0), Entry::new(0, 3.0)]);
    let loaded = SimpleDMatrix::from_reader(&mut Cursor::new(buffer)).unwrap();
    let gidx = loaded
        .get_gradient_index(&host_ctx(), &BatchParam::new(16, 0.2))
        .unwrap()
        .next()
        .unwrap();
    assert_eq!(gidx.size(), 2);
}
