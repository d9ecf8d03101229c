//! Core data types for the gradient-boosting data container.
//!
//! This module defines the fundamental value types shared by the canonical
//! store, the derived pages and the adapters: sparse entries, index aliases,
//! device ordinals and the distributed split mode.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use std::fmt;

/// Row index type. 64-bit so that offsets never overflow on large inputs.
pub type BstIdx = u64;

/// Feature (column) index type stored inside every [`Entry`].
pub type BstFeature = u32;

/// Bin index type used by the quantized pages.
pub type BstBin = u32;

/// Float type used for feature values, labels and weights.
pub type BstFloat = f32;

/// Sentinel returned by an adapter that cannot report a dimension up front.
pub const ADAPTER_UNKNOWN_SIZE: u64 = u64::MAX;

/// A single non-missing value of the sparse representation.
///
/// In a row-major page `index` is the column; in a column-major page it is
/// the row (relative to the page base row id).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct Entry {
    /// Column index (row-major pages) or row index (column-major pages).
    pub index: BstFeature,
    /// Feature value.
    pub fvalue: BstFloat,
}

const_assert_eq!(std::mem::size_of::<Entry>(), 8);

impl Entry {
    /// Create a new entry.
    #[inline]
    pub fn new(index: BstFeature, fvalue: BstFloat) -> Self {
        Entry { index, fvalue }
    }

    /// Ordering by index, used when sorting rows of a row-major page.
    #[inline]
    pub fn cmp_index(a: &Entry, b: &Entry) -> std::cmp::Ordering {
        a.index.cmp(&b.index)
    }

    /// Ordering by value, used when sorting the columns of a column-major page.
    #[inline]
    pub fn cmp_value(a: &Entry, b: &Entry) -> std::cmp::Ordering {
        a.fvalue.total_cmp(&b.fvalue)
    }
}

/// A `(row, column, value)` triplet produced by an adapter batch.
///
/// `row_idx` is relative to the first row of the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct COOTuple {
    /// Row index relative to the batch.
    pub row_idx: usize,
    /// Column index.
    pub column_idx: usize,
    /// Raw value, possibly missing.
    pub value: f32,
}

impl COOTuple {
    /// Create a new triplet.
    #[inline]
    pub fn new(row_idx: usize, column_idx: usize, value: f32) -> Self {
        COOTuple {
            row_idx,
            column_idx,
            value,
        }
    }
}

/// Device kind a page can be materialized on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// Host memory.
    CPU,
    /// CUDA device memory.
    CUDA,
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::CPU
    }
}

/// A device together with its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceOrd {
    /// Kind of device.
    pub device: DeviceType,
    /// Ordinal of the device, `-1` for the host.
    pub ordinal: i32,
}

impl DeviceOrd {
    /// The host.
    pub const fn cpu() -> Self {
        DeviceOrd {
            device: DeviceType::CPU,
            ordinal: -1,
        }
    }

    /// A CUDA device with the given ordinal.
    pub const fn cuda(ordinal: i32) -> Self {
        DeviceOrd {
            device: DeviceType::CUDA,
            ordinal,
        }
    }

    /// Whether this is a CUDA device.
    pub fn is_cuda(&self) -> bool {
        self.device == DeviceType::CUDA
    }

    /// Whether this is the host.
    pub fn is_cpu(&self) -> bool {
        self.device == DeviceType::CPU
    }
}

impl Default for DeviceOrd {
    fn default() -> Self {
        DeviceOrd::cpu()
    }
}

impl fmt::Display for DeviceOrd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device {
            DeviceType::CPU => write!(f, "cpu"),
            DeviceType::CUDA => write!(f, "cuda:{}", self.ordinal),
        }
    }
}

/// How a distributed dataset is partitioned across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSplitMode {
    /// Each worker holds a subset of rows.
    Row,
    /// Each worker holds a subset of columns.
    Col,
}

impl Default for DataSplitMode {
    fn default() -> Self {
        DataSplitMode::Row
    }
}

impl DataSplitMode {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            DataSplitMode::Row => 0,
            DataSplitMode::Col => 1,
        }
    }
}

impl fmt::Display for DataSplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSplitMode::Row => write!(f, "row"),
            DataSplitMode::Col => write!(f, "col"),
        }
    }
}

/// Feature type recorded in the meta information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    /// Numerical feature.
    Numerical,
    /// Categorical feature, values are category codes.
    Categorical,
}

impl Default for FeatureType {
    fn default() -> Self {
        FeatureType::Numerical
    }
}
