//! Histogram cut points.
//!
//! For every feature the cuts are the upper bounds of its bins, stored back to
//! back in `cut_values` with `cut_ptrs` delimiting the features. A value falls
//! into the first bin whose upper bound is strictly greater than it.
//!
//! Numerical features get at most `max_bin` bins from a weighted quantile
//! sketch over the column; categorical features get one bin per category.

use crate::core::constants::MIN_MAX_BIN;
use crate::core::error::{DMatrixError, Result};
use crate::core::types::{BstBin, Entry, FeatureType};
use crate::dataset::meta::MetaInfo;
use crate::dataset::sparse_page::SparsePage;
use crate::ensure;
use rayon::prelude::*;
use std::ops::Range;

/// Cut points of every feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramCuts {
    /// Upper bounds of the bins, feature after feature.
    pub cut_values: Vec<f32>,
    /// `num_features + 1` offsets into `cut_values`.
    pub cut_ptrs: Vec<u32>,
    /// Lower bound of every feature.
    pub min_vals: Vec<f32>,
}

fn pad(value: f32) -> f32 {
    value.abs() + 1e-5
}

/// Cuts of one numerical feature from `(value, weight)` pairs sorted by value.
fn numerical_cuts(sorted: &[(f32, f32)], max_bin: usize) -> (Vec<f32>, f32) {
    let first = match sorted.first() {
        Some(&(v, _)) => v,
        None => return (Vec::new(), 0.0),
    };
    let mut distinct: Vec<(f32, f64)> = Vec::new();
    for &(v, w) in sorted {
        match distinct.last_mut() {
            Some((last, acc)) if *last == v => *acc += w as f64,
            _ => distinct.push((v, w as f64)),
        }
    }
    let max = distinct[distinct.len() - 1].0;
    let mut cuts = Vec::with_capacity(max_bin.min(distinct.len()));

    if distinct.len() <= max_bin {
        cuts.extend(distinct.iter().skip(1).map(|&(v, _)| v));
    } else {
        let total: f64 = distinct.iter().map(|&(_, w)| w).sum();
        let mut cumulative = 0.0;
        let mut k = 1usize;
        for &(v, w) in &distinct {
            cumulative += w;
            while k < max_bin && cumulative >= total * k as f64 / max_bin as f64 {
                if v > first && cuts.last().map_or(true, |&last| v > last) {
                    cuts.push(v);
                }
                k += 1;
            }
        }
        if cuts.last() == Some(&max) {
            cuts.pop();
        }
    }
    cuts.push(max + pad(max));
    (cuts, first - pad(first))
}

impl HistogramCuts {
    /// Number of features.
    pub fn num_features(&self) -> usize {
        self.cut_ptrs.len().saturating_sub(1)
    }

    /// Total number of bins over all features.
    pub fn total_bins(&self) -> usize {
        self.cut_values.len()
    }

    /// Global bin range of feature `f`.
    pub fn feature_bins(&self, f: usize) -> Range<usize> {
        self.cut_ptrs[f] as usize..self.cut_ptrs[f + 1] as usize
    }

    /// Global bin of `value` in feature `f`. Values above the last cut land
    /// in the last bin.
    pub fn search_bin(&self, f: usize, value: f32) -> BstBin {
        let range = self.feature_bins(f);
        let cuts = &self.cut_values[range.clone()];
        let local = cuts.partition_point(|&c| c <= value);
        let local = local.min(cuts.len().saturating_sub(1));
        (range.start + local) as BstBin
    }

    /// Global bin of a stored entry.
    pub fn search_entry(&self, e: &Entry) -> BstBin {
        self.search_bin(e.index as usize, e.fvalue)
    }

    /// Build cuts from a column-major page.
    ///
    /// Sketch weights are the `hess` values when given, otherwise the row
    /// weights of `info`, otherwise 1.
    pub fn build(
        csc: &SparsePage,
        info: &MetaInfo,
        max_bin: usize,
        hess: Option<&[f32]>,
    ) -> Result<HistogramCuts> {
        ensure!(
            max_bin >= MIN_MAX_BIN as usize,
            DMatrixError::InvalidMaxBin {
                max_bin: max_bin as i32
            }
        );
        if let Some(h) = hess {
            if h.len() as u64 != info.num_row {
                return Err(DMatrixError::dimension_mismatch(
                    format!("{} hessian values", info.num_row),
                    format!("{}", h.len()),
                ));
            }
        }
        let row_weights: Option<&[f32]> = match hess {
            Some(h) => Some(h),
            None if info.weights.len() as u64 == info.num_row && info.num_row > 0 => {
                Some(&info.weights)
            }
            None => None,
        };

        let num_features = info.num_col as usize;
        let per_feature: Vec<(Vec<f32>, f32)> = (0..num_features)
            .into_par_iter()
            .map(|f| {
                let column: &[Entry] = if f < csc.size() { csc.row(f) } else { &[] };
                if info.feature_type(f) == FeatureType::Categorical {
                    let seen = column
                        .iter()
                        .map(|e| e.fvalue as usize + 1)
                        .max()
                        .unwrap_or(0);
                    let n_cats = seen.max(info.cats().num_categories(f)).max(1);
                    return ((1..=n_cats).map(|c| c as f32).collect(), 0.0);
                }
                let mut pairs: Vec<(f32, f32)> = column
                    .iter()
                    .map(|e| {
                        let w = row_weights.map_or(1.0, |w| w[e.index as usize]);
                        (e.fvalue, w)
                    })
                    .collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
                numerical_cuts(&pairs, max_bin)
            })
            .collect();

        let mut cuts = HistogramCuts {
            cut_values: Vec::new(),
            cut_ptrs: Vec::with_capacity(num_features + 1),
            min_vals: Vec::with_capacity(num_features),
        };
        cuts.cut_ptrs.push(0);
        for (values, min_val) in per_feature {
            cuts.cut_values.extend(values);
            cuts.cut_ptrs.push(cuts.cut_values.len() as u32);
            cuts.min_vals.push(min_val);
        }
        Ok(cuts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Entry;

    fn column_page(columns: Vec<Vec<Entry>>) -> SparsePage {
        let mut page = SparsePage::new();
        for col in columns {
            page.data.extend(col);
            page.offset.push(page.data.len() as u64);
        }
        page
    }

    fn info(rows: u64, cols: u64) -> MetaInfo {
        MetaInfo {
            num_row: rows,
            num_col: cols,
            ..Default::default()
        }
    }

    #[test]
    fn test_few_distinct_values() {
        let csc = column_page(vec![vec![
            Entry::new(0, 1.0),
            Entry::new(1, 2.0),
            Entry::new(2, 2.0),
            Entry::new(3, 5.0),
        ]]);
        let cuts = HistogramCuts::build(&csc, &info(4, 1), 16, None).unwrap();
        assert_eq!(cuts.feature_bins(0).len(), 3);
        assert_eq!(cuts.search_bin(0, 1.0), 0);
        assert_eq!(cuts.search_bin(0, 2.0), 1);
        assert_eq!(cuts.search_bin(0, 5.0), 2);
        assert_eq!(cuts.search_bin(0, 100.0), 2);
        assert!(cuts.min_vals[0] < 1.0);
    }

    #[test]
    fn test_bin_count_bounded_by_max_bin() {
        let col: Vec<Entry> = (0..1000).map(|i| Entry::new(i, i as f32)).collect();
        let csc = column_page(vec![col]);
        for max_bin in [2usize, 16, 32] {
            let cuts = HistogramCuts::build(&csc, &info(1000, 1), max_bin, None).unwrap();
            let n = cuts.feature_bins(0).len();
            assert!(n <= max_bin && n >= max_bin / 2, "max_bin {} gave {}", max_bin, n);
            assert!(cuts.cut_values.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_hessian_weights_shift_cuts() {
        let col: Vec<Entry> = (0..100).map(|i| Entry::new(i, i as f32)).collect();
        let csc = column_page(vec![col]);
        let uniform = HistogramCuts::build(&csc, &info(100, 1), 4, None).unwrap();
        let mut hess = vec![1.0f32; 100];
        for h in hess.iter_mut().skip(90) {
            *h = 100.0;
        }
        let weighted = HistogramCuts::build(&csc, &info(100, 1), 4, Some(&hess)).unwrap();
        assert_ne!(uniform.cut_values, weighted.cut_values);
        assert!(weighted.cut_values[0] > uniform.cut_values[0]);
    }

    #[test]
    fn test_categorical_feature() {
        let csc = column_page(vec![vec![Entry::new(0, 2.0), Entry::new(1, 0.0)]]);
        let mut meta = info(2, 1);
        meta.feature_types = vec![FeatureType::Categorical];
        let cuts = HistogramCuts::build(&csc, &meta, 16, None).unwrap();
        assert_eq!(cuts.feature_bins(0).len(), 3);
        assert_eq!(cuts.search_bin(0, 2.0), 2);
        assert_eq!(cuts.search_bin(0, 0.0), 0);
    }

    #[test]
    fn test_empty_column_and_bad_args() {
        let csc = column_page(vec![vec![], vec![Entry::new(0, 1.0)]]);
        let cuts = HistogramCuts::build(&csc, &info(1, 2), 8, None).unwrap();
        assert_eq!(cuts.feature_bins(0).len(), 0);
        assert_eq!(cuts.feature_bins(1).len(), 1);
        assert!(HistogramCuts::build(&csc, &info(1, 2), 1, None).is_err());
        assert!(HistogramCuts::build(&csc, &info(1, 2), 8, Some(&[1.0, 2.0])).is_err());
    }
}
