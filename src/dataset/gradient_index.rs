//! Histogram index page.
//!
//! Every stored value of the canonical page is replaced by its global bin id.
//! The layout follows the canonical page: `row_ptr` equals the row offsets and
//! `index` holds one bin per entry.

use crate::core::constants::DEFAULT_SPARSE_THRESHOLD;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::types::{BstBin, DeviceOrd, FeatureType};
use crate::dataset::batch_param::BatchParam;
use crate::dataset::meta::MetaInfo;
use crate::dataset::quantile::HistogramCuts;
use crate::dataset::sparse_page::SparsePage;
use rayon::prelude::*;

/// Storage class of a column in the histogram index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Density at or above the sparse threshold
    Dense,
    /// Density below the sparse threshold
    Sparse,
}

/// Quantized row-major page used by host histogram building.
#[derive(Debug, Clone)]
pub struct GHistIndexMatrix {
    /// Cut points the bins refer to
    pub cuts: HistogramCuts,
    /// Row pointers into `index`
    pub row_ptr: Vec<u64>,
    /// Global bin id of every stored value
    pub index: Vec<BstBin>,
    /// Number of values per bin
    pub hit_count: Vec<u64>,
    /// Largest bin count of any numerical feature
    pub max_numeric_bins_per_feat: usize,
    /// Per-feature storage class
    pub column_types: Vec<ColumnType>,
    /// Global id of the first row
    pub base_rowid: u64,
    /// `max_bin` the page was built with
    pub max_bin: i32,
    /// Sparse threshold the page was built with
    pub sparse_thresh: f64,
    /// Whether the hessian weighted the sketch
    pub hess_used: bool,
    /// Device the page lives on
    pub device: DeviceOrd,
}

impl GHistIndexMatrix {
    /// Quantize `page` using cuts sketched from its transpose `csc`.
    pub fn new(
        ctx: &Context,
        page: &SparsePage,
        csc: &SparsePage,
        info: &MetaInfo,
        param: &BatchParam,
    ) -> Result<Self> {
        param.check_max_bin()?;
        let sorted_sketch = param.regen;
        let hess = if sorted_sketch { param.hess.as_deref() } else { None };

        ctx.install(|| {
            let cuts = HistogramCuts::build(csc, info, param.max_bin as usize, hess)?;
            let index: Vec<BstBin> = page.data.par_iter().map(|e| cuts.search_entry(e)).collect();

            let mut hit_count = vec![0u64; cuts.total_bins()];
            for &bin in &index {
                hit_count[bin as usize] += 1;
            }

            let sparse_thresh = if param.sparse_thresh.is_nan() {
                DEFAULT_SPARSE_THRESHOLD
            } else {
                param.sparse_thresh
            };
            let rows = info.num_row.max(1) as f64;
            let column_types = (0..cuts.num_features())
                .map(|f| {
                    let nnz = if f < csc.size() { csc.row(f).len() } else { 0 };
                    if (nnz as f64) / rows < sparse_thresh {
                        ColumnType::Sparse
                    } else {
                        ColumnType::Dense
                    }
                })
                .collect();

            let max_numeric_bins_per_feat = (0..cuts.num_features())
                .filter(|&f| info.feature_type(f) == FeatureType::Numerical)
                .map(|f| cuts.feature_bins(f).len())
                .max()
                .unwrap_or(0);

            log::debug!(
                "Built gradient index: {} rows, {} bins, max_bin {}",
                page.size(),
                cuts.total_bins(),
                param.max_bin
            );

            Ok(GHistIndexMatrix {
                cuts,
                row_ptr: page.offset.clone(),
                index,
                hit_count,
                max_numeric_bins_per_feat,
                column_types,
                base_rowid: page.base_rowid,
                max_bin: param.max_bin,
                sparse_thresh,
                hess_used: hess.is_some(),
                device: ctx.device(),
            })
        })
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.row_ptr.len().saturating_sub(1)
    }

    /// Bins of row `i`.
    pub fn row_bins(&self, i: usize) -> &[BstBin] {
        &self.index[self.row_ptr[i] as usize..self.row_ptr[i + 1] as usize]
    }

    /// Whether every row stores every feature.
    pub fn is_dense(&self) -> bool {
        let features = self.cuts.num_features() as u64;
        self.row_ptr.windows(2).all(|w| w[1] - w[0] == features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Entry;
    use std::sync::Arc;

    fn fixture() -> (SparsePage, SparsePage, MetaInfo) {
        let page = SparsePage::from_parts(
            vec![0, 2, 3, 5, 6],
            vec![
                Entry::new(0, 1.0),
                Entry::new(1, 10.0),
                Entry::new(0, 2.0),
                Entry::new(0, 3.0),
                Entry::new(1, 30.0),
                Entry::new(0, 4.0),
            ],
        )
        .unwrap();
        let csc = page.get_transpose(2, 1).unwrap();
        let info = MetaInfo {
            num_row: 4,
            num_col: 2,
            num_nonzero: 6,
            ..Default::default()
        };
        (page, csc, info)
    }

    #[test]
    fn test_build() {
        let ctx = Context::new(2).unwrap();
        let (page, csc, info) = fixture();
        let gidx = GHistIndexMatrix::new(&ctx, &page, &csc, &info, &BatchParam::new(16, 0.6)).unwrap();

        assert_eq!(gidx.size(), 4);
        assert_eq!(gidx.index.len(), 6);
        assert_eq!(gidx.hit_count.iter().sum::<u64>(), 6);
        assert_eq!(gidx.cuts.feature_bins(0).len(), 4);
        assert_eq!(gidx.max_numeric_bins_per_feat, 4);
        assert_eq!(gidx.row_bins(1), &[1]);
        let f1_start = gidx.cuts.feature_bins(1).start as BstBin;
        assert_eq!(gidx.row_bins(2), &[2, f1_start + 1]);
        assert_eq!(gidx.column_types, vec![ColumnType::Dense, ColumnType::Sparse]);
        assert!(!gidx.is_dense());
        assert!(!gidx.hess_used);
    }

    #[test]
    fn test_hess_only_used_when_regenerating() {
        let ctx = Context::new(1).unwrap();
        let (page, csc, info) = fixture();
        let hess: Arc<[f32]> = Arc::from(vec![1.0f32; 4]);

        let plain = BatchParam::with_hess(16, Arc::clone(&hess), false);
        let gidx = GHistIndexMatrix::new(&ctx, &page, &csc, &info, &plain).unwrap();
        assert!(!gidx.hess_used);

        let regen = BatchParam::with_hess(16, hess, true);
        let gidx = GHistIndexMatrix::new(&ctx, &page, &csc, &info, &regen).unwrap();
        assert!(gidx.hess_used);
    }

    #[test]
    fn test_rejects_small_max_bin() {
        let ctx = Context::new(1).unwrap();
        let (page, csc, info) = fixture();
        assert!(GHistIndexMatrix::new(&ctx, &page, &csc, &info, &BatchParam::new(1, 0.2)).is_err());
    }
}
