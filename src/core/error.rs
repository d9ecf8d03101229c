//! Error handling and error types for the data container.
//!
//! Every operation of the container either succeeds completely or returns one
//! of these errors. Consistency violations (magic mismatch, inconsistent
//! binning parameters, categorical column slicing, ...) are unrecoverable:
//! [`DMatrixError::is_recoverable`] reports `false` and the surrounding
//! training loop is expected to abort.

use std::io;
use thiserror::Error;

/// Main error type for the data container.
#[derive(Error, Debug)]
pub enum DMatrixError {
    /// Invalid or unreadable container settings
    #[error("Invalid DMatrix configuration: {message}")]
    Config {
        /// What is wrong with the settings
        message: String,
    },

    /// Input data that cannot be ingested
    #[error("Invalid input data: {message}")]
    Dataset {
        /// What is wrong with the input
        message: String,
    },

    /// Meta information that does not agree with the data
    #[error("Invalid meta info: {message}")]
    MetaInfo {
        /// Which array disagrees and how
        message: String,
    },

    /// Binary stream does not start with the container magic number
    #[error("Invalid format, magic number mismatch: expected {expected:#x}, got {actual:#x}")]
    MagicMismatch {
        /// Magic number of this format
        expected: i32,
        /// First four bytes of the stream
        actual: i32,
    },

    /// Quantized pages require at least two bins
    #[error("max_bin must be at least 2, got {max_bin}")]
    InvalidMaxBin {
        /// Requested bin count
        max_bin: i32,
    },

    /// A cached quantized page was built with a different `max_bin`
    #[error(
        "Inconsistent `max_bin`: cached page uses {cached}, request uses {requested}. \
         `max_bin` must be the same between training and evaluation data"
    )]
    InconsistentMaxBin {
        /// `max_bin` of the cached page
        cached: i32,
        /// `max_bin` of the request
        requested: i32,
    },

    /// A cached quantized page was built with a different sparse threshold
    #[error("Inconsistent sparse threshold: cached page uses {cached}, request uses {requested}")]
    InconsistentSparseThreshold {
        /// Threshold of the cached page
        cached: f64,
        /// Threshold of the request
        requested: f64,
    },

    /// A forbid-regen request that would still require regeneration
    #[error("Page regeneration is forbidden but the requested parameters require it")]
    RegenForbidden,

    /// Uninitialized batch parameter without a cached page
    #[error("Batch parameter is not initialized")]
    UninitializedBatchParam,

    /// Column slicing of data with categorical features
    #[error("Slicing column is not supported for data with categorical columns")]
    CategoricalColumnSlice,

    /// Too many rows for the entry index type
    #[error("Sample size {actual} exceeds the maximum supported size {max}")]
    MaxSampleSize {
        /// Highest row id the page would need
        actual: u64,
        /// Largest representable row id
        max: u64,
    },

    /// Adapter cannot report its row count and is not an inferable kind
    #[error("Adapter of kind `{kind}` cannot report its number of rows")]
    UnknownRowCount {
        /// Adapter kind
        kind: String,
    },

    /// Failure inside a collective operation
    #[error("Collective operation `{op}` failed: {message}")]
    Collective {
        /// Name of the collective
        op: String,
        /// Failure detail
        message: String,
    },

    /// Workers disagree on a value that must be identical
    #[error("Inconsistent {what} across workers")]
    InconsistentAcrossWorkers {
        /// Value the workers disagree on
        what: String,
    },

    /// Corrupted or unsupported binary stream
    #[error("Malformed binary stream: {message}")]
    Serialization {
        /// What is malformed
        message: String,
    },

    /// Reading or writing a data file failed
    #[error("I/O failure: {source}")]
    IO {
        /// Underlying I/O error
        #[from]
        source: io::Error,
    },

    /// Malformed CSV input
    #[cfg(feature = "csv")]
    #[error("CSV input: {source}")]
    Csv {
        /// Underlying CSV error
        #[from]
        source: csv::Error,
    },

    /// JSON config or category export
    #[error("JSON: {source}")]
    Json {
        /// Underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Encoding or decoding a bincode record
    #[error("bincode: {source}")]
    Bincode {
        /// Underlying bincode error
        #[from]
        source: bincode::Error,
    },

    /// TOML configuration errors
    #[error("TOML error: {source}")]
    Toml {
        /// Underlying TOML error
        #[from]
        source: toml::de::Error,
    },

    /// Error raised by a user supplied callback
    #[error("External callback error: {source}")]
    External {
        /// Error returned by the callback
        #[from]
        source: anyhow::Error,
    },

    /// Argument outside its accepted range
    #[error("Invalid argument `{parameter}` = {value}: {reason}")]
    InvalidParameter {
        /// Argument name
        parameter: String,
        /// Value given
        value: String,
        /// Constraint it violates
        reason: String,
    },

    /// Array lengths that do not describe the same shape
    #[error("Shape mismatch: expected {expected}, found {actual}")]
    DimensionMismatch {
        /// Shape implied by the other arrays
        expected: String,
        /// Shape found
        actual: String,
    },

    /// Row index past the end of the container
    #[error("Row {index} out of range for {length} rows")]
    IndexOutOfBounds {
        /// Offending row
        index: usize,
        /// Number of rows
        length: usize,
    },

    /// Broken internal state, such as a poisoned lock
    #[error("Internal: {message}")]
    Internal {
        /// Description of the broken state
        message: String,
    },
}

/// Result of every fallible container operation.
pub type Result<T> = std::result::Result<T, DMatrixError>;

impl DMatrixError {
    /// Configuration error from a message.
    pub fn config<S: Into<String>>(message: S) -> Self {
        DMatrixError::Config {
            message: message.into(),
        }
    }

    /// Input data error from a message.
    pub fn dataset<S: Into<String>>(message: S) -> Self {
        DMatrixError::Dataset {
            message: message.into(),
        }
    }

    /// Meta information error from a message.
    pub fn meta_info<S: Into<String>>(message: S) -> Self {
        DMatrixError::MetaInfo {
            message: message.into(),
        }
    }

    /// Failure of collective `op`.
    pub fn collective<O: Into<String>, S: Into<String>>(op: O, message: S) -> Self {
        DMatrixError::Collective {
            op: op.into(),
            message: message.into(),
        }
    }

    /// Workers disagree on `what`.
    pub fn inconsistent_across_workers<S: Into<String>>(what: S) -> Self {
        DMatrixError::InconsistentAcrossWorkers { what: what.into() }
    }

    /// Malformed stream error from a message.
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        DMatrixError::Serialization {
            message: message.into(),
        }
    }

    /// Argument error naming the parameter, its value and the constraint.
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        DMatrixError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Shape error.
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        DMatrixError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Row index error.
    pub fn index_out_of_bounds(index: usize, length: usize) -> Self {
        DMatrixError::IndexOutOfBounds { index, length }
    }

    /// Internal error from a message.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        DMatrixError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable.
    ///
    /// Only I/O and user callback failures are worth retrying; everything else
    /// is a consistency violation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DMatrixError::IO { .. } | DMatrixError::External { .. }
        )
    }

    /// Short stable name of the variant, used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            DMatrixError::Config { .. } => "config",
            DMatrixError::Dataset { .. } => "dataset",
            DMatrixError::MetaInfo { .. } => "meta_info",
            DMatrixError::MagicMismatch { .. } => "magic_mismatch",
            DMatrixError::InvalidMaxBin { .. } => "invalid_max_bin",
            DMatrixError::InconsistentMaxBin { .. } => "inconsistent_max_bin",
            DMatrixError::InconsistentSparseThreshold { .. } => "inconsistent_sparse_threshold",
            DMatrixError::RegenForbidden => "regen_forbidden",
            DMatrixError::UninitializedBatchParam => "uninitialized_batch_param",
            DMatrixError::CategoricalColumnSlice => "categorical_column_slice",
            DMatrixError::MaxSampleSize { .. } => "max_sample_size",
            DMatrixError::UnknownRowCount { .. } => "unknown_row_count",
            DMatrixError::Collective { .. } => "collective",
            DMatrixError::InconsistentAcrossWorkers { .. } => "inconsistent_across_workers",
            DMatrixError::Serialization { .. } => "serialization",
            DMatrixError::IO { .. } => "io",
            #[cfg(feature = "csv")]
            DMatrixError::Csv { .. } => "csv",
            DMatrixError::Json { .. } => "json",
            DMatrixError::Bincode { .. } => "bincode",
            DMatrixError::Toml { .. } => "toml",
            DMatrixError::External { .. } => "external",
            DMatrixError::InvalidParameter { .. } => "invalid_parameter",
            DMatrixError::DimensionMismatch { .. } => "dimension_mismatch",
            DMatrixError::IndexOutOfBounds { .. } => "index_out_of_bounds",
            DMatrixError::Internal { .. } => "internal",
        }
    }
}

/// `DMatrixError::Dataset` from a message or a format string.
#[macro_export]
macro_rules! dataset_error {
    ($msg:expr) => {
        $crate::core::error::DMatrixError::dataset($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::DMatrixError::dataset(format!($fmt, $($arg)*))
    };
}

/// `DMatrixError::MetaInfo` from a message or a format string.
#[macro_export]
macro_rules! meta_error {
    ($msg:expr) => {
        $crate::core::error::DMatrixError::meta_info($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::DMatrixError::meta_info(format!($fmt, $($arg)*))
    };
}

/// Return `$err` unless `$cond` holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DMatrixError::config("test configuration error");
        assert_eq!(err.category(), "config");
        assert!(!err.is_recoverable());

        let err = DMatrixError::InconsistentMaxBin {
            cached: 16,
            requested: 32,
        };
        assert_eq!(err.category(), "inconsistent_max_bin");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_macros() {
        let err = dataset_error!("test error");
        assert!(matches!(err, DMatrixError::Dataset { .. }));

        let err = meta_error!("labels: {} rows", 42);
        assert!(matches!(err, DMatrixError::MetaInfo { .. }));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_ensure_macro() {
        fn check(v: i32) -> Result<()> {
            ensure!(v >= 2, DMatrixError::InvalidMaxBin { max_bin: v });
            Ok(())
        }
        assert!(check(2).is_ok());
        assert!(matches!(check(1), Err(DMatrixError::InvalidMaxBin { max_bin: 1 })));
    }

    #[test]
    fn test_magic_display() {
        let err = DMatrixError::MagicMismatch {
            expected: 0x10,
            actual: 0x20,
        };
        let s = err.to_string();
        assert!(s.contains("magic number mismatch"));
        assert!(s.contains("0x10"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: DMatrixError = io_err.into();
        assert!(matches!(err, DMatrixError::IO { .. }));
        assert_eq!(err.category(), "io");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_external_error_conversion() {
        let err: DMatrixError = anyhow::anyhow!("callback failed").into();
        assert_eq!(err.category(), "external");
        assert!(err.to_string().contains("callback failed"));
    }
}
