//! Device binned page.
//!
//! ELLPACK layout: every row occupies `row_stride` slots of global bin ids,
//! padded with `null_gidx`. The page records the device it was materialized
//! for; the buffer itself lives in host memory.

use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::types::{BstBin, DeviceOrd};
use crate::dataset::batch_param::BatchParam;
use crate::dataset::meta::MetaInfo;
use crate::dataset::quantile::HistogramCuts;
use crate::dataset::sparse_page::SparsePage;
use rayon::prelude::*;

/// Fixed stride binned page.
#[derive(Debug, Clone)]
pub struct EllpackPage {
    /// Device the page was materialized for
    pub device: DeviceOrd,
    /// Cut points the bins refer to
    pub cuts: HistogramCuts,
    /// Slots per row, the largest row length
    pub row_stride: usize,
    /// Whether every row stores every feature
    pub is_dense: bool,
    /// `n_rows * row_stride` bin ids
    pub gidx: Vec<BstBin>,
    /// Padding bin id, one past the last real bin
    pub null_gidx: BstBin,
    /// Number of rows
    pub n_rows: usize,
    /// Global id of the first row
    pub base_rowid: u64,
}

impl EllpackPage {
    /// Quantize `page` into ELLPACK form on `ctx`'s device.
    pub fn new(
        ctx: &Context,
        page: &SparsePage,
        csc: &SparsePage,
        info: &MetaInfo,
        param: &BatchParam,
    ) -> Result<Self> {
        param.check_max_bin()?;
        ctx.install(|| {
            let cuts = HistogramCuts::build(csc, info, param.max_bin as usize, None)?;
            let n_rows = page.size();
            let row_stride = page.rows().map(<[_]>::len).max().unwrap_or(0);
            let null_gidx = cuts.total_bins() as BstBin;
            let is_dense = info.num_col > 0 && page.num_nonzero() == info.num_row * info.num_col;

            let mut gidx = vec![null_gidx; n_rows * row_stride];
            if row_stride > 0 {
                gidx.par_chunks_mut(row_stride)
                    .enumerate()
                    .for_each(|(i, slots)| {
                        for (slot, e) in slots.iter_mut().zip(page.row(i)) {
                            *slot = cuts.search_entry(e);
                        }
                    });
            }

            log::info!(
                "Generated ellpack page on {}: {} rows, stride {}",
                ctx.device(),
                n_rows,
                row_stride
            );

            Ok(EllpackPage {
                device: ctx.device(),
                cuts,
                row_stride,
                is_dense,
                gidx,
                null_gidx,
                n_rows,
                base_rowid: page.base_rowid,
            })
        })
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.n_rows
    }

    /// Non-padding bins of row `i`.
    pub fn row_bins(&self, i: usize) -> Vec<BstBin> {
        self.gidx[i * self.row_stride..(i + 1) * self.row_stride]
            .iter()
            .copied()
            .filter(|&b| b != self.null_gidx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Entry;

    #[test]
    fn test_ellpack_layout() {
        let ctx = Context::with_device(DeviceOrd::cuda(1), 2).unwrap();
        let page = SparsePage::from_parts(
            vec![0, 1, 1, 3],
            vec![Entry::new(1, 5.0), Entry::new(0, 2.0), Entry::new(3, 1.0)],
        )
        .unwrap();
        let csc = page.get_transpose(4, 1).unwrap();
        let info = MetaInfo {
            num_row: 3,
            num_col: 4,
            num_nonzero: 3,
            ..Default::default()
        };
        let ellpack = EllpackPage::new(&ctx, &page, &csc, &info, &BatchParam::new(8, 0.2)).unwrap();

        assert_eq!(ellpack.device, DeviceOrd::cuda(1));
        assert_eq!(ellpack.row_stride, 2);
        assert_eq!(ellpack.gidx.len(), 6);
        assert!(!ellpack.is_dense);
        assert_eq!(ellpack.null_gidx as usize, ellpack.cuts.total_bins());
        assert!(ellpack.row_bins(1).is_empty());
        assert_eq!(ellpack.row_bins(2).len(), 2);
        assert_eq!(ellpack.gidx[3], ellpack.null_gidx);
    }
}
