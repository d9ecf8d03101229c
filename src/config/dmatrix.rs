//! Construction parameters of the data container.

use crate::core::constants::*;
use crate::core::error::{DMatrixError, Result};
use crate::core::types::{DataSplitMode, DeviceOrd};
use crate::dataset::batch_param::BatchParam;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Construction parameters of a [`SimpleDMatrix`](crate::dataset::SimpleDMatrix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DMatrixConfig {
    /// Value treated as missing besides NaN
    pub missing: f32,
    /// Number of threads (0 = all logical cores)
    pub nthread: usize,
    /// How the data is partitioned across workers
    pub data_split_mode: DataSplitMode,
    /// Rows per batch when reading text files
    pub file_chunk_rows: usize,
    /// Default number of histogram bins for quantized pages
    pub max_bin: i32,
    /// Default sparsity threshold for the histogram index page
    pub sparse_threshold: f64,
    /// Device recorded for later page placement decisions
    pub device: DeviceOrd,
}

impl Default for DMatrixConfig {
    fn default() -> Self {
        DMatrixConfig {
            missing: DEFAULT_MISSING,
            nthread: DEFAULT_NUM_THREADS,
            data_split_mode: DataSplitMode::Row,
            file_chunk_rows: DEFAULT_FILE_CHUNK_ROWS,
            max_bin: DEFAULT_MAX_BIN,
            sparse_threshold: DEFAULT_SPARSE_THRESHOLD,
            device: DeviceOrd::cpu(),
        }
    }
}

impl DMatrixConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a builder from the defaults
    pub fn builder() -> DMatrixConfigBuilder {
        DMatrixConfigBuilder::new()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.missing.is_infinite() {
            return Err(DMatrixError::invalid_parameter(
                "missing",
                self.missing.to_string(),
                "must be finite or NaN",
            ));
        }

        if self.file_chunk_rows == 0 {
            return Err(DMatrixError::invalid_parameter(
                "file_chunk_rows",
                "0",
                "must be at least 1",
            ));
        }

        if self.max_bin < MIN_MAX_BIN {
            return Err(DMatrixError::invalid_parameter(
                "max_bin",
                self.max_bin.to_string(),
                format!("must be at least {}", MIN_MAX_BIN),
            ));
        }

        if !(0.0..=1.0).contains(&self.sparse_threshold) {
            return Err(DMatrixError::invalid_parameter(
                "sparse_threshold",
                self.sparse_threshold.to_string(),
                "must be in range [0.0, 1.0]",
            ));
        }

        if self.device.is_cuda() && self.device.ordinal < 0 {
            return Err(DMatrixError::invalid_parameter(
                "device",
                self.device.to_string(),
                "CUDA ordinal must be non-negative",
            ));
        }

        Ok(())
    }

    /// Number of threads after resolving 0 to the number of logical cores
    pub fn effective_num_threads(&self) -> usize {
        if self.nthread == 0 {
            num_cpus::get()
        } else {
            self.nthread
        }
    }

    /// Batch parameter built from the default binning settings
    pub fn batch_param(&self) -> BatchParam {
        BatchParam::new(self.max_bin, self.sparse_threshold)
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: DMatrixConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DMatrixError::config(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Load configuration from a `.toml` or `.json` file.
    ///
    /// `GBM_DMATRIX_NTHREAD` and `GBM_DMATRIX_MISSING` override the file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DMatrixError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: DMatrixConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| DMatrixError::config(format!("Failed to parse JSON config: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| DMatrixError::config(format!("Failed to parse TOML config: {}", e)))?,
            _ => {
                return Err(DMatrixError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.apply_environment_overrides()?;
        Ok(config)
    }

    /// Save configuration to a `.toml` or `.json` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| DMatrixError::config(format!("Failed to serialize to JSON: {}", e)))?,
            Some("toml") => self.to_toml_string()?,
            _ => {
                return Err(DMatrixError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)
            .map_err(|e| DMatrixError::config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Apply `GBM_DMATRIX_NTHREAD` and `GBM_DMATRIX_MISSING` overrides
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("GBM_DMATRIX_NTHREAD") {
            self.nthread = val
                .parse()
                .map_err(|_| DMatrixError::config("Invalid GBM_DMATRIX_NTHREAD"))?;
        }

        if let Ok(val) = std::env::var("GBM_DMATRIX_MISSING") {
            self.missing = val
                .parse()
                .map_err(|_| DMatrixError::config("Invalid GBM_DMATRIX_MISSING"))?;
        }

        self.validate()
    }
}

/// Configuration builder for fluent configuration creation
#[derive(Debug, Clone, Default)]
pub struct DMatrixConfigBuilder {
    config: DMatrixConfig,
}

impl DMatrixConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the missing value
    pub fn missing(mut self, missing: f32) -> Self {
        self.config.missing = missing;
        self
    }

    /// Set the number of threads
    pub fn nthread(mut self, nthread: usize) -> Self {
        self.config.nthread = nthread;
        self
    }

    /// Set the data split mode
    pub fn data_split_mode(mut self, mode: DataSplitMode) -> Self {
        self.config.data_split_mode = mode;
        self
    }

    /// Set the device
    pub fn device(mut self, device: DeviceOrd) -> Self {
        self.config.device = device;
        self
    }

    /// Set the file chunk size
    pub fn file_chunk_rows(mut self, rows: usize) -> Self {
        self.config.file_chunk_rows = rows;
        self
    }

    /// Set the default number of bins
    pub fn max_bin(mut self, max_bin: i32) -> Self {
        self.config.max_bin = max_bin;
        self
    }

    /// Set the default sparsity threshold
    pub fn sparse_threshold(mut self, threshold: f64) -> Self {
        self.config.sparse_threshold = threshold;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<DMatrixConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
