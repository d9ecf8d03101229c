//! Columnar adapter with optional categorical columns.

use super::{Adapter, AdapterKind, Batch, BatchData, BatchMeta};
use crate::core::error::{DMatrixError, Result};
use crate::dataset::categories::CatContainer;

/// One input column.
#[derive(Debug, Clone, Copy)]
pub enum Column<'a> {
    /// Numerical values; NaN is missing.
    Numeric(&'a [f32]),
    /// Category codes into `categories`; negative codes are missing.
    Categorical {
        /// Codes, one per row
        codes: &'a [i32],
        /// Dictionary the codes refer to
        categories: &'a [String],
    },
}

impl Column<'_> {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at row `i` as stored in the canonical page.
    pub fn value(&self, i: usize) -> f32 {
        match self {
            Column::Numeric(values) => values[i],
            Column::Categorical { codes, .. } => {
                let code = codes[i];
                if code < 0 {
                    f32::NAN
                } else {
                    code as f32
                }
            }
        }
    }
}

/// Re-encode categorical columns against `reference`; numerical columns are
/// copied unchanged.
pub(crate) fn recode_columns(columns: &[Column<'_>], reference: &CatContainer) -> Vec<Vec<f32>> {
    columns
        .iter()
        .enumerate()
        .map(|(f, column)| match column {
            Column::Numeric(values) => values.to_vec(),
            Column::Categorical { codes, categories } => reference.recode(f, categories, codes),
        })
        .collect()
}

/// Single batch adapter over a set of equally long columns.
#[derive(Debug)]
pub struct ColumnarAdapter<'a> {
    columns: Vec<Column<'a>>,
    num_rows: usize,
    ref_cats: Option<CatContainer>,
    meta: BatchMeta<'a>,
    consumed: bool,
}

impl<'a> ColumnarAdapter<'a> {
    /// Create an adapter; all columns must have the same length.
    pub fn new(columns: Vec<Column<'a>>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, Column::len);
        if let Some((f, column)) = columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != num_rows)
        {
            return Err(DMatrixError::dimension_mismatch(
                format!("{} rows in every column", num_rows),
                format!("{} rows in column {}", column.len(), f),
            ));
        }
        Ok(ColumnarAdapter {
            columns,
            num_rows,
            ref_cats: None,
            meta: BatchMeta::default(),
            consumed: false,
        })
    }

    /// Encode categorical columns against a previously fitted dictionary.
    pub fn with_ref_categories(mut self, reference: CatContainer) -> Self {
        self.ref_cats = Some(reference);
        self
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

impl Adapter for ColumnarAdapter<'_> {
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
            data: BatchData::Columns {
                columns: &self.columns,
                num_rows: self.num_rows,
            },
            meta: self.meta,
        }
    }

    fn num_rows(&self) -> u64 {
        self.num_rows as u64
    }

    fn num_columns(&self) -> u64 {
        self.columns.len() as u64
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Columnar
    }

    fn categories(&self) -> Option<CatContainer> {
        let features: Vec<Option<Vec<String>>> = self
            .columns
            .iter()
            .map(|c| match c {
                Column::Numeric(_) => None,
                Column::Categorical { categories, .. } => Some(categories.to_vec()),
            })
            .collect();
        let cats = CatContainer::new(features);
        cats.has_categorical().then_some(cats)
    }

    fn ref_categories(&self) -> Option<&CatContainer> {
        self.ref_cats.as_ref()
    }
}
