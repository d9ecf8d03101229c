//! Per-row meta information of a dataset.
//!
//! [`MetaInfo`] carries the shape of the canonical page, the per-row arrays
//! (labels, weights, base margins), the ranking group boundaries and the
//! category dictionaries. Dictionaries are shared between a container and its
//! slices and copied on first mutation.

use crate::core::collective::{Communicator, ReduceOp};
use crate::core::constants::{META_BINARY_VERSION, META_LEGACY_VERSION};
use crate::core::context::Context;
use crate::core::error::{DMatrixError, Result};
use crate::core::types::{DataSplitMode, DeviceOrd, FeatureType};
use crate::dataset::categories::CatContainer;
use crate::meta_error;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

/// Meta information of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaInfo {
    /// Number of rows
    pub num_row: u64,
    /// Number of columns
    pub num_col: u64,
    /// Number of stored entries
    pub num_nonzero: u64,
    /// Labels; `num_row * targets` values, row-major
    pub labels: Vec<f32>,
    /// Weights, per row or per group
    pub weights: Vec<f32>,
    /// Base margins; `num_row * groups` values, row-major
    pub base_margin: Vec<f32>,
    /// Ranking group boundaries: starts at 0, ends at `num_row`
    pub group_ptr: Vec<u32>,
    /// How the data is partitioned across workers
    pub data_split_mode: DataSplitMode,
    /// Optional feature names
    pub feature_names: Vec<String>,
    /// Optional feature types
    pub feature_types: Vec<FeatureType>,
    pub(crate) cats: Arc<CatContainer>,
}

#[derive(Serialize)]
struct MetaBinaryRef<'a> {
    num_row: u64,
    num_col: u64,
    num_nonzero: u64,
    labels: &'a [f32],
    weights: &'a [f32],
    base_margin: &'a [f32],
    group_ptr: &'a [u32],
    data_split_mode: DataSplitMode,
    feature_names: &'a [String],
    feature_types: &'a [FeatureType],
    cats: &'a CatContainer,
}

#[derive(Deserialize)]
struct MetaBinary {
    num_row: u64,
    num_col: u64,
    num_nonzero: u64,
    labels: Vec<f32>,
    weights: Vec<f32>,
    base_margin: Vec<f32>,
    group_ptr: Vec<u32>,
    data_split_mode: DataSplitMode,
    feature_names: Vec<String>,
    feature_types: Vec<FeatureType>,
    cats: CatContainer,
}

/// Version 1 layout, without feature information and categories.
#[derive(Serialize, Deserialize)]
struct LegacyMetaBinary {
    num_row: u64,
    num_col: u64,
    num_nonzero: u64,
    labels: Vec<f32>,
    weights: Vec<f32>,
    base_margin: Vec<f32>,
    group_ptr: Vec<u32>,
}

/// Gather fixed-width row chunks of `values` for the rows in `ridx`.
fn gather_rows(values: &[f32], num_row: u64, ridx: &[usize]) -> Vec<f32> {
    if values.is_empty() || num_row == 0 {
        return Vec::new();
    }
    let width = values.len() / num_row as usize;
    let mut out = Vec::with_capacity(ridx.len() * width);
    for &r in ridx {
        out.extend_from_slice(&values[r * width..(r + 1) * width]);
    }
    out
}

impl MetaInfo {
    /// Empty meta information.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ranking groups, 0 when the data is not grouped.
    pub fn num_groups(&self) -> usize {
        self.group_ptr.len().saturating_sub(1)
    }

    /// Whether the data is partitioned by columns.
    pub fn is_column_split(&self) -> bool {
        self.data_split_mode == DataSplitMode::Col
    }

    /// Whether the data is partitioned by rows.
    pub fn is_row_split(&self) -> bool {
        self.data_split_mode == DataSplitMode::Row
    }

    /// Category dictionaries.
    pub fn cats(&self) -> &CatContainer {
        &self.cats
    }

    /// Shared handle to the category dictionaries.
    pub fn cats_shared(&self) -> Arc<CatContainer> {
        Arc::clone(&self.cats)
    }

    /// Replace the category dictionaries.
    pub fn set_cats(&mut self, cats: Arc<CatContainer>) {
        self.cats = cats;
    }

    /// Mutable dictionaries; detaches from any container sharing them.
    pub fn cats_mut(&mut self) -> &mut CatContainer {
        Arc::make_mut(&mut self.cats)
    }

    /// Whether any feature is categorical.
    pub fn has_categorical(&self) -> bool {
        self.cats.has_categorical()
            || self
                .feature_types
                .iter()
                .any(|t| *t == FeatureType::Categorical)
    }

    /// Feature type of column `f`.
    pub fn feature_type(&self, f: usize) -> FeatureType {
        match self.feature_types.get(f) {
            Some(t) => *t,
            None if self.cats.is_categorical(f) => FeatureType::Categorical,
            None => FeatureType::Numerical,
        }
    }

    /// Set the group boundaries from group sizes.
    pub fn set_group(&mut self, group_sizes: &[u32]) {
        self.group_ptr.clear();
        self.group_ptr.reserve(group_sizes.len() + 1);
        self.group_ptr.push(0);
        let mut running = 0u32;
        for &size in group_sizes {
            running += size;
            self.group_ptr.push(running);
        }
    }

    /// Group id of row `r` (index into `group_ptr`).
    fn group_of(&self, r: usize) -> usize {
        self.group_ptr
            .partition_point(|&start| start as usize <= r)
            .saturating_sub(1)
    }

    /// Meta information of the rows in `ridx`.
    ///
    /// Row arrays are gathered in the given order. Groups are rebuilt from
    /// contiguous runs of rows belonging to the same source group. The
    /// category dictionaries are shared, not copied.
    pub fn slice(&self, ctx: &Context, ridx: &[usize], nnz: u64) -> Result<MetaInfo> {
        if let Some(&bad) = ridx.iter().find(|&&r| r as u64 >= self.num_row) {
            return Err(DMatrixError::index_out_of_bounds(bad, self.num_row as usize));
        }
        log::debug!("Slicing meta info on {} to {} rows", ctx.device(), ridx.len());

        let mut out = MetaInfo {
            num_row: ridx.len() as u64,
            num_col: self.num_col,
            num_nonzero: nnz,
            labels: gather_rows(&self.labels, self.num_row, ridx),
            base_margin: gather_rows(&self.base_margin, self.num_row, ridx),
            data_split_mode: self.data_split_mode,
            feature_names: self.feature_names.clone(),
            feature_types: self.feature_types.clone(),
            cats: Arc::clone(&self.cats),
            ..Default::default()
        };

        if self.group_ptr.is_empty() {
            if self.weights.len() as u64 == self.num_row {
                out.weights = gather_rows(&self.weights, self.num_row, ridx);
            }
            return Ok(out);
        }

        let per_group_weights = !self.weights.is_empty() && self.weights.len() == self.num_groups();
        let mut last_group = None;
        for (i, &r) in ridx.iter().enumerate() {
            let g = self.group_of(r);
            if last_group != Some(g) {
                out.group_ptr.push(i as u32);
                if per_group_weights {
                    out.weights.push(self.weights[g]);
                }
            }
            last_group = Some(g);
        }
        if !ridx.is_empty() {
            out.group_ptr.push(ridx.len() as u32);
        }
        if !per_group_weights && self.weights.len() as u64 == self.num_row {
            out.weights = gather_rows(&self.weights, self.num_row, ridx);
        }
        Ok(out)
    }

    /// Deep copy of the row arrays; dictionaries stay shared until mutated.
    pub fn copy(&self) -> MetaInfo {
        self.clone()
    }

    /// Check that every array agrees with the shape.
    pub fn validate(&self, device: DeviceOrd) -> Result<()> {
        log::debug!("Validating meta info for {}", device);
        let rows = self.num_row as usize;

        let per_row = |name: &str, len: usize| -> Result<()> {
            if len == 0 {
                return Ok(());
            }
            if rows == 0 || len % rows != 0 {
                return Err(meta_error!(
                    "Size of {} ({}) is not a multiple of the number of rows ({})",
                    name,
                    len,
                    rows
                ));
            }
            Ok(())
        };
        per_row("labels", self.labels.len())?;
        per_row("base_margin", self.base_margin.len())?;

        if !self.group_ptr.is_empty() {
            if self.group_ptr[0] != 0 {
                return Err(meta_error!("group_ptr must start at 0"));
            }
            if self.group_ptr.windows(2).any(|w| w[0] >= w[1]) {
                return Err(meta_error!("group_ptr must be strictly increasing"));
            }
            let last = self.group_ptr[self.group_ptr.len() - 1] as u64;
            if last != self.num_row {
                return Err(meta_error!(
                    "Invalid group structure: groups cover {} rows, data has {}",
                    last,
                    self.num_row
                ));
            }
        }

        if !self.weights.is_empty() {
            let expected = if self.group_ptr.is_empty() {
                rows
            } else {
                self.num_groups()
            };
            if self.weights.len() != expected {
                return Err(meta_error!(
                    "Size of weights ({}) must equal the number of {} ({})",
                    self.weights.len(),
                    if self.group_ptr.is_empty() { "rows" } else { "groups" },
                    expected
                ));
            }
            if self.weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
                return Err(meta_error!("Weights must be finite and non-negative"));
            }
        }

        let cols = self.num_col as usize;
        if !self.feature_names.is_empty() && self.feature_names.len() != cols {
            return Err(meta_error!(
                "{} feature names for {} columns",
                self.feature_names.len(),
                cols
            ));
        }
        if !self.feature_types.is_empty() && self.feature_types.len() != cols {
            return Err(meta_error!(
                "{} feature types for {} columns",
                self.feature_types.len(),
                cols
            ));
        }
        Ok(())
    }

    /// Agree on the number of columns across workers: the maximum for a row
    /// split, the sum for a column split. Records the split mode.
    pub fn synchronize_number_of_columns(
        &mut self,
        comm: &dyn Communicator,
        split_mode: DataSplitMode,
    ) -> Result<()> {
        self.data_split_mode = split_mode;
        if !comm.is_distributed() {
            return Ok(());
        }
        let op = match split_mode {
            DataSplitMode::Row => ReduceOp::Max,
            DataSplitMode::Col => ReduceOp::Sum,
        };
        let mut buffer = [self.num_col];
        comm.allreduce(&mut buffer, op)?;
        log::debug!(
            "Worker {} synchronized columns: {} -> {}",
            comm.rank(),
            self.num_col,
            buffer[0]
        );
        self.num_col = buffer[0];
        Ok(())
    }

    /// Write the versioned binary form.
    pub fn save_binary<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&META_BINARY_VERSION.to_le_bytes())?;
        let record = MetaBinaryRef {
            num_row: self.num_row,
            num_col: self.num_col,
            num_nonzero: self.num_nonzero,
            labels: &self.labels,
            weights: &self.weights,
            base_margin: &self.base_margin,
            group_ptr: &self.group_ptr,
            data_split_mode: self.data_split_mode,
            feature_names: &self.feature_names,
            feature_types: &self.feature_types,
            cats: &self.cats,
        };
        bincode::serialize_into(writer, &record)?;
        Ok(())
    }

    /// Write the version 1 layout. Feature information, categories and the
    /// split mode are dropped.
    pub fn save_binary_legacy<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&META_LEGACY_VERSION.to_le_bytes())?;
        let record = LegacyMetaBinary {
            num_row: self.num_row,
            num_col: self.num_col,
            num_nonzero: self.num_nonzero,
            labels: self.labels.clone(),
            weights: self.weights.clone(),
            base_margin: self.base_margin.clone(),
            group_ptr: self.group_ptr.clone(),
        };
        bincode::serialize_into(writer, &record)?;
        Ok(())
    }

    /// Read the binary form written by [`MetaInfo::save_binary`] or by an
    /// older release.
    pub fn load_binary<R: Read>(reader: &mut R) -> Result<MetaInfo> {
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag)?;
        let version = u32::from_le_bytes(tag);
        match version {
            META_BINARY_VERSION => {
                let record: MetaBinary = bincode::deserialize_from(reader)?;
                Ok(MetaInfo {
                    num_row: record.num_row,
                    num_col: record.num_col,
                    num_nonzero: record.num_nonzero,
                    labels: record.labels,
                    weights: record.weights,
                    base_margin: record.base_margin,
                    group_ptr: record.group_ptr,
                    data_split_mode: record.data_split_mode,
                    feature_names: record.feature_names,
                    feature_types: record.feature_types,
                    cats: Arc::new(record.cats),
                })
            }
            META_LEGACY_VERSION => {
                log::warn!(
                    "Loading meta info from a legacy binary format (version {}). \
                     Save the data again to upgrade it.",
                    version
                );
                let record: LegacyMetaBinary = bincode::deserialize_from(reader)?;
                Ok(MetaInfo {
                    num_row: record.num_row,
                    num_col: record.num_col,
                    num_nonzero: record.num_nonzero,
                    labels: record.labels,
                    weights: record.weights,
                    base_margin: record.base_margin,
                    group_ptr: record.group_ptr,
                    ..Default::default()
                })
            }
            other => Err(DMatrixError::serialization(format!(
                "Unsupported meta info version {}",
                other
            ))),
        }
    }
}
