//! Row-major sparse page and its column-major views.
//!
//! [`SparsePage`] is the canonical CSR store: `offset` holds `rows + 1`
//! non-decreasing row pointers and `data` the entries, `offset.last() ==
//! data.len()`. The transposed pages reuse the same shape keyed by column.

use crate::core::constants::MIN_ROWS_PER_BLOCK;
use crate::core::error::{DMatrixError, Result};
use crate::core::types::{BstFeature, Entry};
use crate::core::utils::Threading;
use crate::dataset::adapter::{Batch, BatchData};
use rayon::prelude::*;
use std::ops::{Deref, Range};
use std::sync::Arc;

/// Whether `value` is stored or treated as missing.
#[inline]
pub fn is_valid(value: f32, missing: f32) -> bool {
    !value.is_nan() && value != missing
}

/// Compressed sparse row page.
#[derive(Debug, Clone, PartialEq)]
pub struct SparsePage {
    /// Row pointers, `rows + 1` long.
    pub offset: Vec<u64>,
    /// Entries of all rows, back to back.
    pub data: Vec<Entry>,
    /// Global id of the first row.
    pub base_rowid: u64,
}

impl Default for SparsePage {
    fn default() -> Self {
        Self::new()
    }
}

impl SparsePage {
    /// Empty page.
    pub fn new() -> Self {
        SparsePage {
            offset: vec![0],
            data: Vec::new(),
            base_rowid: 0,
        }
    }

    /// Page from raw parts.
    pub fn from_parts(offset: Vec<u64>, data: Vec<Entry>) -> Result<Self> {
        let page = SparsePage {
            offset,
            data,
            base_rowid: 0,
        };
        page.check()?;
        Ok(page)
    }

    /// Verify the offset invariants.
    pub fn check(&self) -> Result<()> {
        let last = match self.offset.last() {
            Some(&last) => last,
            None => return Err(DMatrixError::dataset("page offset must not be empty")),
        };
        if self.offset[0] != 0 || self.offset.windows(2).any(|w| w[0] > w[1]) {
            return Err(DMatrixError::dataset(
                "page offset must start at 0 and be non-decreasing",
            ));
        }
        if last != self.data.len() as u64 {
            return Err(DMatrixError::dimension_mismatch(
                format!("{} entries", last),
                format!("{} entries", self.data.len()),
            ));
        }
        Ok(())
    }

    /// Number of rows (or columns for a transposed page).
    pub fn size(&self) -> usize {
        self.offset.len().saturating_sub(1)
    }

    /// Whether the page has no rows.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of stored entries.
    pub fn num_nonzero(&self) -> u64 {
        self.data.len() as u64
    }

    /// Entries of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[Entry] {
        &self.data[self.offset[i] as usize..self.offset[i + 1] as usize]
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[Entry]> + '_ {
        (0..self.size()).map(move |i| self.row(i))
    }

    /// Remove all rows.
    pub fn clear(&mut self) {
        self.offset.clear();
        self.offset.push(0);
        self.data.clear();
    }

    /// Pad with empty rows until the page has `rows` rows.
    pub fn pad_rows(&mut self, rows: usize) {
        let last = self.offset.last().copied().unwrap_or(0);
        if self.offset.is_empty() {
            self.offset.push(0);
        }
        while self.size() < rows {
            self.offset.push(last);
        }
    }

    fn segments_mut(&mut self) -> Vec<&mut [Entry]> {
        let mut rest: &mut [Entry] = &mut self.data;
        let mut out = Vec::with_capacity(self.offset.len().saturating_sub(1));
        for w in self.offset.windows(2) {
            let len = (w[1] - w[0]) as usize;
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
            out.push(head);
            rest = tail;
        }
        out
    }

    /// Append the valid elements of an adapter batch as new rows.
    ///
    /// NaN and `missing` are skipped. Dense batches reject infinite values.
    /// Returns the number of columns seen (max column index + 1).
    pub fn push(&mut self, batch: &Batch<'_>, missing: f32, nthread: usize) -> Result<u64> {
        let reject_inf = matches!(batch.data, BatchData::Dense { .. }) && !missing.is_infinite();

        let chunks = Threading::map_blocks(nthread, batch.size(), MIN_ROWS_PER_BLOCK, |_, lines| {
            let mut out: Vec<(usize, Entry)> = Vec::new();
            let mut bad = None;
            for i in lines {
                batch.for_each_in_line(i, |t| {
                    if bad.is_some() {
                        return;
                    }
                    if reject_inf && t.value.is_infinite() {
                        bad = Some((t.row_idx, t.column_idx));
                        return;
                    }
                    if is_valid(t.value, missing) {
                        out.push((t.row_idx, Entry::new(t.column_idx as BstFeature, t.value)));
                    }
                });
                if bad.is_some() {
                    break;
                }
            }
            match bad {
                Some((row, col)) => Err(DMatrixError::dataset(format!(
                    "Input data contains `inf` at row {}, column {}",
                    row, col
                ))),
                None => Ok(out),
            }
        });
        let chunks = chunks.into_iter().collect::<Result<Vec<_>>>()?;

        let mut batch_rows = batch.num_rows_hint().unwrap_or(0);
        let mut num_cols = 0u64;
        for &(row, entry) in chunks.iter().flatten() {
            batch_rows = batch_rows.max(row + 1);
            num_cols = num_cols.max(entry.index as u64 + 1);
        }

        let mut counts = vec![0u64; batch_rows];
        for &(row, _) in chunks.iter().flatten() {
            counts[row] += 1;
        }

        let base = self.size();
        let mut running = self.offset.last().copied().unwrap_or(0);
        self.offset.reserve(batch_rows);
        for count in counts {
            running += count;
            self.offset.push(running);
        }

        let mut cursor: Vec<u64> = self.offset[base..base + batch_rows].to_vec();
        self.data.resize(running as usize, Entry::default());
        for (row, entry) in chunks.into_iter().flatten() {
            self.data[cursor[row] as usize] = entry;
            cursor[row] += 1;
        }
        Ok(num_cols)
    }

    /// Column-major copy of this page with `num_columns` columns.
    ///
    /// Entry indices of the result are global row ids. Within a column the
    /// entries keep row order.
    pub fn get_transpose(&self, num_columns: usize, nthread: usize) -> Result<SparsePage> {
        let max_row = self.base_rowid + self.size() as u64;
        if max_row > u32::MAX as u64 {
            return Err(DMatrixError::MaxSampleSize {
                actual: max_row,
                max: u32::MAX as u64,
            });
        }

        let block_counts = Threading::map_blocks(nthread, self.size(), MIN_ROWS_PER_BLOCK, |_, rows| {
            let mut counts = vec![0u64; num_columns];
            for i in rows {
                for e in self.row(i) {
                    if let Some(c) = counts.get_mut(e.index as usize) {
                        *c += 1;
                    }
                }
            }
            counts
        });

        let mut offset = Vec::with_capacity(num_columns + 1);
        offset.push(0u64);
        let mut running = 0u64;
        for col in 0..num_columns {
            running += block_counts.iter().map(|c| c[col]).sum::<u64>();
            offset.push(running);
        }

        let mut cursor: Vec<u64> = offset[..num_columns].to_vec();
        let mut data = vec![Entry::default(); running as usize];
        for (i, row) in self.rows().enumerate() {
            let rowid = (self.base_rowid + i as u64) as BstFeature;
            for e in row {
                if let Some(pos) = cursor.get_mut(e.index as usize) {
                    data[*pos as usize] = Entry::new(rowid, e.fvalue);
                    *pos += 1;
                }
            }
        }

        Ok(SparsePage {
            offset,
            data,
            base_rowid: 0,
        })
    }

    /// Sort the entries of every row by value.
    pub fn sort_rows(&mut self) {
        self.segments_mut()
            .into_par_iter()
            .for_each(|seg| seg.sort_by(Entry::cmp_value));
    }

    /// Sort the entries of every row by index.
    pub fn sort_indices(&mut self) {
        self.segments_mut()
            .into_par_iter()
            .for_each(|seg| seg.sort_by(Entry::cmp_index));
    }

    /// Whether every row is sorted by index.
    pub fn is_indices_sorted(&self) -> bool {
        (0..self.size())
            .into_par_iter()
            .all(|i| self.row(i).windows(2).all(|w| w[0].index <= w[1].index))
    }

    /// Shift every entry index by `feature_offset`.
    pub fn reindex(&mut self, feature_offset: u64) -> Result<()> {
        let max_index = self.data.iter().map(|e| e.index as u64).max().unwrap_or(0);
        if max_index + feature_offset > BstFeature::MAX as u64 {
            return Err(DMatrixError::dataset(format!(
                "feature index {} exceeds the supported range after reindexing",
                max_index + feature_offset
            )));
        }
        let shift = feature_offset as BstFeature;
        self.data.par_iter_mut().for_each(|e| e.index += shift);
        Ok(())
    }

    /// New page holding the rows listed in `ridx`, in that order.
    pub fn select_rows(&self, ridx: &[usize]) -> Result<SparsePage> {
        if let Some(&bad) = ridx.iter().find(|&&r| r >= self.size()) {
            return Err(DMatrixError::index_out_of_bounds(bad, self.size()));
        }
        let mut offset = Vec::with_capacity(ridx.len() + 1);
        offset.push(0u64);
        let mut running = 0u64;
        for &r in ridx {
            running += self.offset[r + 1] - self.offset[r];
            offset.push(running);
        }
        let mut data = Vec::with_capacity(running as usize);
        for &r in ridx {
            data.extend_from_slice(self.row(r));
        }
        Ok(SparsePage {
            offset,
            data,
            base_rowid: 0,
        })
    }

    /// New page keeping only entries whose index lies in `columns`.
    /// Indices are kept as they are.
    pub fn filter_columns(&self, columns: Range<u64>) -> SparsePage {
        let rows: Vec<Vec<Entry>> = (0..self.size())
            .into_par_iter()
            .map(|i| {
                self.row(i)
                    .iter()
                    .filter(|e| columns.contains(&(e.index as u64)))
                    .copied()
                    .collect()
            })
            .collect();
        let mut page = SparsePage::new();
        page.offset.reserve(rows.len());
        for row in rows {
            page.data.extend(row);
            page.offset.push(page.data.len() as u64);
        }
        page
    }
}

/// Column-major page, entries per column in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct CscPage(pub SparsePage);

/// Column-major page, entries per column sorted by value.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedCscPage(pub SparsePage);

impl Deref for CscPage {
    type Target = SparsePage;
    fn deref(&self) -> &SparsePage {
        &self.0
    }
}

impl Deref for SortedCscPage {
    type Target = SparsePage;
    fn deref(&self) -> &SparsePage {
        &self.0
    }
}

/// External view of the canonical page. Shares the page, never copies it.
#[derive(Debug, Clone)]
pub struct ExtSparsePage {
    /// The shared canonical page
    pub page: Arc<SparsePage>,
}

impl Deref for ExtSparsePage {
    type Target = SparsePage;
    fn deref(&self) -> &SparsePage {
        &self.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::adapter::CsrBlock;

    fn example_page() -> SparsePage {
        SparsePage::from_parts(
            vec![0, 1, 1, 3],
            vec![Entry::new(1, 5.0), Entry::new(0, 2.0), Entry::new(3, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_push_csr_batch() {
        let mut block = CsrBlock::new();
        block.push_row(vec![(1, 5.0)]);
        block.push_row(Vec::new());
        block.push_row(vec![(0, 2.0), (3, 1.0)]);

        let mut page = SparsePage::new();
        let cols = page.push(&block.as_batch(), f32::NAN, 4).unwrap();
        assert_eq!(cols, 4);
        assert_eq!(page, example_page());
    }

    #[test]
    fn test_push_skips_missing() {
        let values = [1.0, f32::NAN, -1.0, 3.0];
        let batch = Batch::new(BatchData::Dense {
            values: &values,
            num_rows: 2,
            num_cols: 2,
        });
        let mut page = SparsePage::new();
        page.push(&batch, -1.0, 1).unwrap();
        assert_eq!(page.offset, vec![0, 1, 2]);
        assert_eq!(page.data, vec![Entry::new(0, 1.0), Entry::new(1, 3.0)]);
    }

    #[test]
    fn test_push_rejects_inf_in_dense() {
        let values = [1.0, f32::INFINITY];
        let batch = Batch::new(BatchData::Dense {
            values: &values,
            num_rows: 1,
            num_cols: 2,
        });
        let mut page = SparsePage::new();
        assert!(page.push(&batch, f32::NAN, 1).is_err());
    }

    #[test]
    fn test_push_appends_and_keeps_trailing_empty_rows() {
        let mut a = CsrBlock::new();
        a.push_row(vec![(0, 1.0)]);
        a.push_row(Vec::new());
        let mut b = CsrBlock::new();
        b.push_row(vec![(2, 3.0)]);

        let mut page = SparsePage::new();
        page.push(&a.as_batch(), f32::NAN, 1).unwrap();
        page.push(&b.as_batch(), f32::NAN, 1).unwrap();
        assert_eq!(page.offset, vec![0, 1, 1, 2]);
        assert_eq!(page.row(2), &[Entry::new(2, 3.0)]);
    }

    #[test]
    fn test_push_csc_batch() {
        let offset = [0usize, 1, 3];
        let indices = [2u32, 0, 2];
        let values = [5.0f32, 6.0, 7.0];
        let batch = Batch::new(BatchData::Csc {
            offset: &offset,
            indices: &indices,
            values: &values,
        });
        let mut page = SparsePage::new();
        let cols = page.push(&batch, f32::NAN, 2).unwrap();
        assert_eq!(cols, 2);
        assert_eq!(page.offset, vec![0, 1, 1, 3]);
        assert_eq!(page.row(2), &[Entry::new(0, 5.0), Entry::new(1, 7.0)]);
    }

    #[test]
    fn test_transpose() {
        let page = example_page();
        let csc = page.get_transpose(4, 2).unwrap();
        assert_eq!(csc.offset, vec![0, 1, 2, 2, 3]);
        assert_eq!(
            csc.data,
            vec![Entry::new(2, 2.0), Entry::new(0, 5.0), Entry::new(2, 1.0)]
        );
    }

    #[test]
    fn test_sort_rows_and_indices() {
        let mut page =
            SparsePage::from_parts(vec![0, 3], vec![Entry::new(2, 1.0), Entry::new(0, 3.0), Entry::new(1, -2.0)])
                .unwrap();
        assert!(!page.is_indices_sorted());
        page.sort_indices();
        assert!(page.is_indices_sorted());
        assert_eq!(page.row(0)[0].index, 0);

        page.sort_rows();
        let values: Vec<f32> = page.row(0).iter().map(|e| e.fvalue).collect();
        assert_eq!(values, vec![-2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_select_and_filter() {
        let page = example_page();
        let sliced = page.select_rows(&[2, 0, 2]).unwrap();
        assert_eq!(sliced.offset, vec![0, 2, 3, 5]);
        assert!(page.select_rows(&[3]).is_err());

        let filtered = page.filter_columns(1..3);
        assert_eq!(filtered.offset, vec![0, 1, 1, 1]);
        assert_eq!(filtered.data, vec![Entry::new(1, 5.0)]);
    }

    #[test]
    fn test_reindex_and_pad() {
        let mut page = example_page();
        page.reindex(10).unwrap();
        assert_eq!(page.data[0].index, 11);
        page.pad_rows(5);
        assert_eq!(page.offset, vec![0, 1, 1, 3, 3, 3]);
        assert!(page.check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_offsets() {
        assert!(SparsePage::from_parts(vec![0, 2], vec![Entry::new(0, 1.0)]).is_err());
        assert!(SparsePage::from_parts(vec![], vec![]).is_err());
    }

    #[test]
    fn test_transpose_rejects_rows_beyond_index_range() {
        let mut page = SparsePage::from_parts(vec![0, 1], vec![Entry::new(0, 1.0)]).unwrap();
        page.base_rowid = u32::MAX as u64;
        match page.get_transpose(1, 1) {
            Err(DMatrixError::MaxSampleSize { actual, max }) => {
                assert_eq!(actual, u32::MAX as u64 + 1);
                assert_eq!(max, u32::MAX as u64);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        page.base_rowid = u32::MAX as u64 - 1;
        let csc = page.get_transpose(1, 1).unwrap();
        assert_eq!(csc.row(0), &[Entry::new(u32::MAX - 1, 1.0)]);
    }
}
