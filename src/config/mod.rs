//! Configuration of the data container.
//!
//! [`DMatrixConfig`] gathers the construction parameters (missing value,
//! threads, split mode, device) and the default binning settings. It can be
//! built fluently, loaded from TOML or JSON, and overridden from the
//! environment.

pub mod dmatrix;

pub use self::dmatrix::{DMatrixConfig, DMatrixConfigBuilder};

/// Default name of a configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "dmatrix.toml";
