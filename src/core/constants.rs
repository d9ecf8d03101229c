//! System constants and defaults for the data container.

/// Magic number at the head of a binary container file.
pub const BINARY_MAGIC: i32 = 0xffff_ab01_u32 as i32;

/// Version tag written in front of the meta information binary form.
pub const META_BINARY_VERSION: u32 = 2;

/// Oldest meta information version that can still be loaded.
/// Version 1 carries no category container.
pub const META_LEGACY_VERSION: u32 = 1;

/// Default value treated as missing by the adapters.
pub const DEFAULT_MISSING: f32 = f32::NAN;

/// Default number of histogram bins.
pub const DEFAULT_MAX_BIN: i32 = 256;

/// Default sparsity threshold for the histogram index page.
pub const DEFAULT_SPARSE_THRESHOLD: f64 = 0.2;

/// Minimum number of bins a quantized page can be built with.
pub const MIN_MAX_BIN: i32 = 2;

/// Tolerance used when comparing sparsity thresholds.
pub const RT_EPS: f64 = 1e-6;

/// Default number of threads (0 = all logical cores).
pub const DEFAULT_NUM_THREADS: usize = 0;

/// Number of rows the file adapter reads per batch.
pub const DEFAULT_FILE_CHUNK_ROWS: usize = 4096;

/// Minimum number of rows handed to one parallel block.
pub const MIN_ROWS_PER_BLOCK: usize = 512;
