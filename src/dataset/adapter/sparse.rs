//! Compressed sparse row and column adapters.

use super::{Adapter, AdapterKind, Batch, BatchData, BatchMeta};
use crate::core::error::{DMatrixError, Result};
use crate::core::types::ADAPTER_UNKNOWN_SIZE;

fn check_compressed(what: &str, offset: &[usize], indices: &[u32], values: &[f32]) -> Result<()> {
    if offset.is_empty() {
        return Err(DMatrixError::dataset(format!("{} offset must not be empty", what)));
    }
    if indices.len() != values.len() {
        return Err(DMatrixError::dimension_mismatch(
            format!("{} values", indices.len()),
            format!("{} values", values.len()),
        ));
    }
    if offset.windows(2).any(|w| w[0] > w[1]) {
        return Err(DMatrixError::dataset(format!(
            "{} offset must be non-decreasing",
            what
        )));
    }
    let last = offset[offset.len() - 1];
    if offset[0] != 0 || last != indices.len() {
        return Err(DMatrixError::dimension_mismatch(
            format!("{} offset spanning [0, {}]", what, indices.len()),
            format!("[{}, {}]", offset[0], last),
        ));
    }
    Ok(())
}

/// Single batch adapter over a CSR triplet.
#[derive(Debug)]
pub struct CsrAdapter<'a> {
    offset: &'a [usize],
    indices: &'a [u32],
    values: &'a [f32],
    num_cols: u64,
    meta: BatchMeta<'a>,
    consumed: bool,
}

impl<'a> CsrAdapter<'a> {
    /// Create an adapter. `num_cols` may be `None` to infer it from the data.
    pub fn new(
        offset: &'a [usize],
        indices: &'a [u32],
        values: &'a [f32],
        num_cols: Option<usize>,
    ) -> Result<Self> {
        check_compressed("CSR", offset, indices, values)?;
        Ok(CsrAdapter {
            offset,
            indices,
            values,
            num_cols: num_cols.map_or(ADAPTER_UNKNOWN_SIZE, |n| n as u64),
            meta: BatchMeta::default(),
            consumed: false,
        })
    }

    /// Attach labels.
    pub fn with_labels(mut self, labels: &'a [f32]) -> Self {
        self.meta.labels = Some(labels);
        self
    }

    /// Attach weights.
    pub fn with_weights(mut self, weights: &'a [f32]) -> Self {
        self.meta.weights = Some(weights);
        self
    }

    /// Attach base margins.
    pub fn with_base_margin(mut self, base_margin: &'a [f32]) -> Self {
        self.meta.base_margin = Some(base_margin);
        self
    }

    /// Attach ranking group ids.
    pub fn with_qid(mut self, qid: &'a [u64]) -> Self {
        self.meta.qid = Some(qid);
        self
    }
}

impl Adapter for CsrAdapter<'_> {
    fn before_first(&mut self) -> Result<()> {
        self.consumed = false;
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        if self.consumed {
            return Ok(false);
        }
        self.consumed = true;
        Ok(true)
    }

    fn value(&self) -> Batch<'_> {
        Batch {
            data: BatchData::Csr {
                offset: self.offset,
                indices: self.indices,
                values: self.values,
            },
            meta: self.meta,
        }
    }

    fn num_rows(&self) -> u64 {
        (self.offset.len() - 1) as u64
    }

    fn num_columns(&self) -> u64 {
        self.num_cols
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Csr
    }
}

/// Single batch adapter over a CSC triplet.
///
/// The number of rows is not known up front; the builder takes it from the
/// canonical offsets after ingestion.
#[derive(Debug)]
pub struct CscAdapter<'a> {
    offset: &'a [usize],
    row_indices: &'a [u32],
    values: &'a [f32],
    consumed: bool,
}

impl<'a> CscAdapter<'a> {
    /// Create an adapter; `offset` has one entry per column plus one.
    pub fn new(offset: &'a [usize], row_indices: &'a [u32], values: &'a [f32]) -> Result<Self> {
        check_compressed("CSC", offset, row_indices, values)?;
        Ok(CscAdapter {
            offset,
            row_indices,
            values,
            consumed: false,
        })
    }
}

impl Adapter for CscAdapter<'_> {
    fn before_first(&mut self) -> Result<()> {
        self.consumed = false;
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        if self.consumed {
            return Ok(false);
        }
        self.consumed = true;
        Ok(true)
    }

    fn value(&self) -> Batch<'_> {
        Batch::new(BatchData::Csc {
            offset: self.offset,
            indices: self.row_indices,
            values: self.values,
        })
    }

    fn num_rows(&self) -> u64 {
        ADAPTER_UNKNOWN_SIZE
    }

    fn num_columns(&self) -> u64 {
        (self.offset.len() - 1) as u64
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Csc
    }
}
