//! Ingestion adapters.
//!
//! An adapter exposes a pull-based iteration contract over some input format:
//! [`Adapter::before_first`] rewinds, [`Adapter::next`] advances to the next
//! batch and [`Adapter::value`] borrows the current batch. The ingestion
//! builder is written once against this trait.
//!
//! Concrete adapters:
//!
//! - [`DenseAdapter`] / [`ArrayAdapter`]: dense row-major input
//! - [`CsrAdapter`] / [`CscAdapter`]: compressed sparse input
//! - [`ColumnarAdapter`]: per-column input with optional categories
//! - [`FileAdapter`]: streaming LibSVM (or CSV) text, optionally gzipped
//! - [`IteratorAdapter`]: legacy callback producing CSR blocks

pub mod columnar;
pub mod dense;
pub mod file;
pub mod iterator;
pub mod sparse;

pub use columnar::{Column, ColumnarAdapter};
pub use dense::{ArrayAdapter, DenseAdapter};
pub use file::{FileAdapter, FileFormat};
pub use iterator::IteratorAdapter;
pub use sparse::{CscAdapter, CsrAdapter};

use crate::core::error::Result;
use crate::core::types::COOTuple;
use crate::dataset::categories::CatContainer;
use std::fmt;

/// Kind of adapter, used when the row count has to be inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Dense `ndarray` input
    Dense,
    /// Dense row-major buffer of any numeric type
    Array,
    /// Compressed sparse rows
    Csr,
    /// Compressed sparse columns
    Csc,
    /// Per-column input
    Columnar,
    /// Streaming text file
    File,
    /// Legacy callback iterator
    Iterator,
}

impl AdapterKind {
    /// Whether the row count can be taken from the number of rows pushed.
    pub fn infers_rows_from_batches(self) -> bool {
        matches!(self, AdapterKind::File | AdapterKind::Iterator)
    }

    /// Whether the row count can be taken from the canonical offsets.
    pub fn infers_rows_from_offsets(self) -> bool {
        matches!(self, AdapterKind::Csc)
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdapterKind::Dense => "dense",
            AdapterKind::Array => "array",
            AdapterKind::Csr => "csr",
            AdapterKind::Csc => "csc",
            AdapterKind::Columnar => "columnar",
            AdapterKind::File => "file",
            AdapterKind::Iterator => "iterator",
        };
        write!(f, "{}", name)
    }
}

/// Physical layout of the values in a batch.
#[derive(Debug, Clone, Copy)]
pub enum BatchData<'a> {
    /// Dense row-major values.
    Dense {
        /// `num_rows * num_cols` values
        values: &'a [f32],
        /// Number of rows
        num_rows: usize,
        /// Number of columns
        num_cols: usize,
    },
    /// Compressed sparse rows; one line per row.
    Csr {
        /// Row pointers, `num_rows + 1` long
        offset: &'a [usize],
        /// Column index of each value
        indices: &'a [u32],
        /// Values
        values: &'a [f32],
    },
    /// Compressed sparse columns; one line per column.
    Csc {
        /// Column pointers, `num_cols + 1` long
        offset: &'a [usize],
        /// Row index of each value
        indices: &'a [u32],
        /// Values
        values: &'a [f32],
    },
    /// Per-column values; one line per row.
    Columns {
        /// Columns, all `num_rows` long
        columns: &'a [Column<'a>],
        /// Number of rows
        num_rows: usize,
    },
}

/// Optional per-row arrays attached to a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchMeta<'a> {
    /// Labels, one per row
    pub labels: Option<&'a [f32]>,
    /// Weights, one per row
    pub weights: Option<&'a [f32]>,
    /// Base margins, one per row
    pub base_margin: Option<&'a [f32]>,
    /// Ranking group ids, one per row
    pub qid: Option<&'a [u64]>,
}

/// A batch borrowed from an adapter.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Values
    pub data: BatchData<'a>,
    /// Per-row arrays
    pub meta: BatchMeta<'a>,
}

impl<'a> Batch<'a> {
    /// Create a batch without meta information.
    pub fn new(data: BatchData<'a>) -> Self {
        Batch {
            data,
            meta: BatchMeta::default(),
        }
    }

    /// Number of lines (rows, or columns for CSC input).
    pub fn size(&self) -> usize {
        match self.data {
            BatchData::Dense { num_rows, .. } => num_rows,
            BatchData::Csr { offset, .. } | BatchData::Csc { offset, .. } => {
                offset.len().saturating_sub(1)
            }
            BatchData::Columns { num_rows, .. } => num_rows,
        }
    }

    /// Number of rows when the layout tells it without scanning.
    pub fn num_rows_hint(&self) -> Option<usize> {
        match self.data {
            BatchData::Csc { .. } => None,
            _ => Some(self.size()),
        }
    }

    /// Visit every raw element of line `i`, including missing values.
    pub fn for_each_in_line<F>(&self, i: usize, mut f: F)
    where
        F: FnMut(COOTuple),
    {
        match self.data {
            BatchData::Dense {
                values, num_cols, ..
            } => {
                let row = &values[i * num_cols..(i + 1) * num_cols];
                for (j, &v) in row.iter().enumerate() {
                    f(COOTuple::new(i, j, v));
                }
            }
            BatchData::Csr {
                offset,
                indices,
                values,
            } => {
                for k in offset[i]..offset[i + 1] {
                    f(COOTuple::new(i, indices[k] as usize, values[k]));
                }
            }
            BatchData::Csc {
                offset,
                indices,
                values,
            } => {
                for k in offset[i]..offset[i + 1] {
                    f(COOTuple::new(indices[k] as usize, i, values[k]));
                }
            }
            BatchData::Columns { columns, .. } => {
                for (j, column) in columns.iter().enumerate() {
                    f(COOTuple::new(i, j, column.value(i)));
                }
            }
        }
    }
}

/// Owned CSR block, the unit produced by streaming adapters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsrBlock {
    /// Row pointers, `rows + 1` long
    pub offset: Vec<usize>,
    /// Column indices
    pub index: Vec<u32>,
    /// Values
    pub value: Vec<f32>,
    /// Labels, one per row
    pub labels: Option<Vec<f32>>,
    /// Weights, one per row
    pub weights: Option<Vec<f32>>,
    /// Ranking group ids, one per row
    pub qid: Option<Vec<u64>>,
}

impl CsrBlock {
    /// Empty block with a single zero row pointer.
    pub fn new() -> Self {
        CsrBlock {
            offset: vec![0],
            ..Default::default()
        }
    }

    /// Number of rows in the block.
    pub fn num_rows(&self) -> usize {
        self.offset.len().saturating_sub(1)
    }

    /// Append one row.
    pub fn push_row(&mut self, entries: impl IntoIterator<Item = (u32, f32)>) {
        if self.offset.is_empty() {
            self.offset.push(0);
        }
        for (index, value) in entries {
            self.index.push(index);
            self.value.push(value);
        }
        self.offset.push(self.index.len());
    }

    /// Borrow the block as an adapter batch.
    pub fn as_batch(&self) -> Batch<'_> {
        Batch {
            data: BatchData::Csr {
                offset: &self.offset,
                indices: &self.index,
                values: &self.value,
            },
            meta: BatchMeta {
                labels: self.labels.as_deref(),
                weights: self.weights.as_deref(),
                base_margin: None,
                qid: self.qid.as_deref(),
            },
        }
    }
}

/// Pull-based ingestion interface implemented per source format.
pub trait Adapter {
    /// Rewind to before the first batch.
    fn before_first(&mut self) -> Result<()>;

    /// Advance to the next batch; `false` at the end.
    fn next(&mut self) -> Result<bool>;

    /// Borrow the current batch. Only valid after `next` returned `true`.
    fn value(&self) -> Batch<'_>;

    /// Number of rows, or [`ADAPTER_UNKNOWN_SIZE`](crate::core::types::ADAPTER_UNKNOWN_SIZE).
    fn num_rows(&self) -> u64;

    /// Number of columns, or [`ADAPTER_UNKNOWN_SIZE`](crate::core::types::ADAPTER_UNKNOWN_SIZE).
    fn num_columns(&self) -> u64;

    /// Kind of this adapter.
    fn kind(&self) -> AdapterKind;

    /// Category dictionaries inferred from the data, if any.
    fn categories(&self) -> Option<CatContainer> {
        None
    }

    /// Caller supplied reference dictionaries to encode against, if any.
    fn ref_categories(&self) -> Option<&CatContainer> {
        None
    }
}
