//! Dense input adapters.

use super::{Adapter, AdapterKind, Batch, BatchData, BatchMeta};
use crate::core::error::{DMatrixError, Result};
use ndarray::ArrayView2;
use num_traits::ToPrimitive;
use std::borrow::Cow;

/// Single batch adapter over a 2-D `ndarray` view.
///
/// Non standard-layout views are copied into row-major order once at
/// construction.
#[derive(Debug)]
pub struct DenseAdapter<'a> {
    values: Cow<'a, [f32]>,
    num_rows: usize,
    num_cols: usize,
    meta: BatchMeta<'a>,
    consumed: bool,
}

impl<'a> DenseAdapter<'a> {
    /// Create an adapter over `view`.
    pub fn new(view: ArrayView2<'a, f32>) -> Self {
        let (num_rows, num_cols) = view.dim();
        let values = match view.to_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(view.iter().copied().collect()),
        };
        DenseAdapter {
            values,
            num_rows,
            num_cols,
            meta: BatchMeta::default(),
            consumed: false,
        }
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

impl Adapter for DenseAdapter<'_> {
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
            data: BatchData::Dense {
                values: &self.values,
                num_rows: self.num_rows,
                num_cols: self.num_cols,
            },
            meta: self.meta,
        }
    }

    fn num_rows(&self) -> u64 {
        self.num_rows as u64
    }

    fn num_columns(&self) -> u64 {
        self.num_cols as u64
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Dense
    }
}

/// Single batch adapter over a row-major buffer of any primitive numeric type.
///
/// Values are converted to `f32` once; values that cannot be represented
/// become NaN and are treated as missing.
#[derive(Debug)]
pub struct ArrayAdapter<'a> {
    values: Vec<f32>,
    num_rows: usize,
    num_cols: usize,
    meta: BatchMeta<'a>,
    consumed: bool,
}

impl<'a> ArrayAdapter<'a> {
    /// Create an adapter over `values` with the given shape.
    pub fn new<T: ToPrimitive>(values: &[T], num_rows: usize, num_cols: usize) -> Result<Self> {
        if values.len() != num_rows * num_cols {
            return Err(DMatrixError::dimension_mismatch(
                format!("{} values for a {}x{} array", num_rows * num_cols, num_rows, num_cols),
                format!("{} values", values.len()),
            ));
        }
        let values = values
            .iter()
            .map(|v| v.to_f32().unwrap_or(f32::NAN))
            .collect();
        Ok(ArrayAdapter {
            values,
            num_rows,
            num_cols,
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

    /// Attach ranking group ids.
    pub fn with_qid(mut self, qid: &'a [u64]) -> Self {
        self.meta.qid = Some(qid);
        self
    }
}

impl Adapter for ArrayAdapter<'_> {
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
            data: BatchData::Dense {
                values: &self.values,
                num_rows: self.num_rows,
                num_cols: self.num_cols,
            },
            meta: self.meta,
        }
    }

    fn num_rows(&self) -> u64 {
        self.num_rows as u64
    }

    fn num_columns(&self) -> u64 {
        self.num_cols as u64
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Array
    }
}
