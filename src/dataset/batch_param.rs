//! Batch parameter: the fingerprint that keys the quantized pages.
//!
//! A quantized page (gradient index or ellpack) is built for one
//! [`BatchParam`]. A later request with a different `max_bin` or
//! `sparse_thresh`, or with `regen` set, makes the cached page stale.
//! `forbid_regen` turns the request into an assertion that the cached page is
//! still valid.

use crate::core::collective::{check_consistent_across_workers, Communicator};
use crate::core::constants::{MIN_MAX_BIN, RT_EPS};
use crate::core::error::{DMatrixError, Result};
use crate::ensure;
use std::sync::Arc;

/// Parameters a quantized page is built with.
#[derive(Debug, Clone)]
pub struct BatchParam {
    /// Maximum number of bins per feature; 0 means uninitialized.
    pub max_bin: i32,
    /// Density below which a column is stored as sparse; NaN when unset.
    pub sparse_thresh: f64,
    /// Request a rebuild even when the parameters did not change.
    pub regen: bool,
    /// Assert that no rebuild is needed.
    pub forbid_regen: bool,
    /// Per-row hessian used as sketch weights when regenerating.
    pub hess: Option<Arc<[f32]>>,
}

impl Default for BatchParam {
    fn default() -> Self {
        BatchParam {
            max_bin: 0,
            sparse_thresh: f64::NAN,
            regen: false,
            forbid_regen: false,
            hess: None,
        }
    }
}

impl PartialEq for BatchParam {
    fn eq(&self, other: &Self) -> bool {
        !self.param_not_equal(other)
            && self.regen == other.regen
            && self.forbid_regen == other.forbid_regen
            && match (&self.hess, &other.hess) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl BatchParam {
    /// Parameter with the given binning settings.
    pub fn new(max_bin: i32, sparse_thresh: f64) -> Self {
        BatchParam {
            max_bin,
            sparse_thresh,
            ..Default::default()
        }
    }

    /// Parameter for a sorted-sketch rebuild weighted by `hess`.
    pub fn with_hess(max_bin: i32, hess: Arc<[f32]>, regen: bool) -> Self {
        BatchParam {
            max_bin,
            hess: Some(hess),
            regen,
            ..Default::default()
        }
    }

    /// Set `regen`.
    pub fn regen(mut self, regen: bool) -> Self {
        self.regen = regen;
        self
    }

    /// Set `forbid_regen`.
    pub fn forbid_regen(mut self, forbid: bool) -> Self {
        self.forbid_regen = forbid;
        self
    }

    /// Whether the parameter carries real values.
    pub fn initialized(&self) -> bool {
        self.max_bin != 0
    }

    /// Whether the binning settings differ from `other`.
    pub fn param_not_equal(&self, other: &BatchParam) -> bool {
        let l_nan = self.sparse_thresh.is_nan();
        let r_nan = other.sparse_thresh.is_nan();
        let thresh_changed = l_nan != r_nan
            || (!l_nan && !r_nan && (self.sparse_thresh - other.sparse_thresh).abs() > RT_EPS);
        self.max_bin != other.max_bin || thresh_changed
    }

    /// Copy to store alongside a cached page. The one-shot flags are cleared
    /// and the hessian reference is kept.
    pub fn make_cache(&self) -> BatchParam {
        BatchParam {
            regen: false,
            forbid_regen: false,
            ..self.clone()
        }
    }

    /// Fail unless `max_bin` can build a quantized page.
    pub fn check_max_bin(&self) -> Result<()> {
        ensure!(
            self.max_bin >= MIN_MAX_BIN,
            DMatrixError::InvalidMaxBin {
                max_bin: self.max_bin
            }
        );
        Ok(())
    }

    /// Bytes compared across workers.
    fn fingerprint(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12);
        bytes.extend_from_slice(&self.max_bin.to_le_bytes());
        bytes.extend_from_slice(&self.sparse_thresh.to_bits().to_le_bytes());
        bytes
    }

    /// Fail unless every worker requests the same binning settings.
    pub fn validate_across_workers(&self, comm: &dyn Communicator) -> Result<()> {
        check_consistent_across_workers(comm, "batch parameter (max_bin, sparse_thresh)", &self.fingerprint())
    }
}

/// Whether a page cached with `old` must be rebuilt for a request `new`.
///
/// An uninitialized request never triggers a rebuild so that a cached page can
/// be consumed without knowing the parameters it was built with.
pub fn regen_ghist(old: &BatchParam, new: &BatchParam) -> bool {
    if !new.initialized() {
        return false;
    }
    new.regen || old.param_not_equal(new)
}

/// An uninitialized request is only legal when a page is already cached.
pub fn check_empty(cached: Option<&BatchParam>, requested: &BatchParam) -> Result<()> {
    if requested.initialized() {
        return Ok(());
    }
    match cached {
        Some(old) if old.initialized() => Ok(()),
        _ => Err(DMatrixError::UninitializedBatchParam),
    }
}

/// Validate a `forbid_regen` request against the cached parameters.
///
/// Never rebuilds; returns an error when a rebuild would be needed.
pub fn check_forbid_regen(old: &BatchParam, new: &BatchParam) -> Result<()> {
    if !new.initialized() {
        return Ok(());
    }
    if old.max_bin != new.max_bin {
        return Err(DMatrixError::InconsistentMaxBin {
            cached: old.max_bin,
            requested: new.max_bin,
        });
    }
    if regen_ghist(old, new) {
        if old.param_not_equal(new) {
            return Err(DMatrixError::InconsistentSparseThreshold {
                cached: old.sparse_thresh,
                requested: new.sparse_thresh,
            });
        }
        return Err(DMatrixError::RegenForbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialized() {
        assert!(!BatchParam::default().initialized());
        assert!(BatchParam::new(256, 0.2).initialized());
    }

    #[test]
    fn test_regen_rules() {
        let old = BatchParam::new(16, 0.2);
        assert!(!regen_ghist(&old, &BatchParam::new(16, 0.2)));
        assert!(!regen_ghist(&old, &BatchParam::new(16, 0.2 + 1e-9)));
        assert!(regen_ghist(&old, &BatchParam::new(32, 0.2)));
        assert!(regen_ghist(&old, &BatchParam::new(16, 0.5)));
        assert!(regen_ghist(&old, &BatchParam::new(16, 0.2).regen(true)));
        assert!(regen_ghist(&old, &BatchParam::new(16, f64::NAN)));
        assert!(!regen_ghist(&old, &BatchParam::default()));
    }

    #[test]
    fn test_make_cache_clears_flags() {
        let hess: Arc<[f32]> = Arc::from(vec![1.0f32, 2.0]);
        let p = BatchParam::with_hess(64, Arc::clone(&hess), true).forbid_regen(true);
        let cached = p.make_cache();
        assert!(!cached.regen);
        assert!(!cached.forbid_regen);
        assert!(Arc::ptr_eq(cached.hess.as_ref().unwrap(), &hess));
        assert_eq!(cached.max_bin, 64);
    }

    #[test]
    fn test_check_empty() {
        let init = BatchParam::new(16, 0.2);
        assert!(check_empty(None, &init).is_ok());
        assert!(check_empty(Some(&init), &BatchParam::default()).is_ok());
        assert!(matches!(
            check_empty(None, &BatchParam::default()),
            Err(DMatrixError::UninitializedBatchParam)
        ));
    }

    #[test]
    fn test_check_forbid_regen() {
        let old = BatchParam::new(16, 0.2);
        assert!(check_forbid_regen(&old, &BatchParam::new(16, 0.2).forbid_regen(true)).is_ok());
        assert!(matches!(
            check_forbid_regen(&old, &BatchParam::new(32, 0.2)),
            Err(DMatrixError::InconsistentMaxBin { cached: 16, requested: 32 })
        ));
        assert!(matches!(
            check_forbid_regen(&old, &BatchParam::new(16, 0.8)),
            Err(DMatrixError::InconsistentSparseThreshold { .. })
        ));
        assert!(matches!(
            check_forbid_regen(&old, &BatchParam::new(16, 0.2).regen(true)),
            Err(DMatrixError::RegenForbidden)
        ));
    }

    #[test]
    fn test_check_max_bin() {
        assert!(BatchParam::new(2, 0.2).check_max_bin().is_ok());
        assert!(matches!(
            BatchParam::new(1, 0.2).check_max_bin(),
            Err(DMatrixError::InvalidMaxBin { max_bin: 1 })
        ));
    }
}
