//! Environment overrides applied when a config file is loaded.
//!
//! Kept in its own test binary: the variables are process wide.

use gbm_dmatrix::prelude::*;
use std::env;
use tempfile::tempdir;

mod common;
use common::*;

const NTHREAD: &str = "GBM_DMATRIX_NTHREAD";
const MISSING: &str = "GBM_DMATRIX_MISSING";

#[test]
fn test_environment_overrides_on_load() {
    let dir = tempdir().unwrap();
    let path = write_text(dir.path(), "dmatrix.toml", &["nthread = 2", "missing = 0.0"]);

    env::remove_var(NTHREAD);
    env::remove_var(MISSING);
    let plain = DMatrixConfig::load_from_file(&path).unwrap();
    assert_eq!(plain.nthread, 2);
    assert_eq!(plain.missing, 0.0);

    env::set_var(NTHREAD, "6");
    env::set_var(MISSING, "-999");
    let overridden = DMatrixConfig::load_from_file(&path).unwrap();
    assert_eq!(overridden.nthread, 6);
    assert_eq!(overridden.missing, -999.0);

    env::set_var(NTHREAD, "many");
    let err = DMatrixConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, DMatrixError::Config { .. }));

    // overrides still go through validation
    env::set_var(NTHREAD, "1");
    env::set_var(MISSING, "inf");
    assert!(matches!(
        DMatrixConfig::load_from_file(&path),
        Err(DMatrixError::InvalidParameter { .. })
    ));

    env::remove_var(NTHREAD);
    env::remove_var(MISSING);
    assert_eq!(DMatrixConfig::load_from_file(&path).unwrap(), plain);
}
