//! # gbm-dmatrix
//!
//! In-memory training data container for gradient boosting.
//!
//! Input of any supported shape (dense arrays, CSR/CSC triplets, per-column
//! data with category dictionaries, LibSVM/CSV text, or a callback producing
//! blocks) is ingested once into a canonical compressed sparse row page. The
//! representations a tree learner needs are derived from it lazily and cached:
//!
//! - column pages, in row order or sorted by value
//! - the histogram index page used by host histogram building
//! - the fixed stride ellpack page used by device histogram building
//!
//! The two quantized pages are rebuilt when a request carries a different
//! `max_bin`, a different sparse threshold or a regeneration request, unless
//! regeneration is forbidden.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gbm_dmatrix::prelude::*;
//! use ndarray::array;
//!
//! # fn main() -> gbm_dmatrix::Result<()> {
//! gbm_dmatrix::init()?;
//!
//! let features = array![[1.0f32, f32::NAN], [2.0, 3.0], [4.0, 5.0]];
//! let labels = [0.0f32, 1.0, 1.0];
//! let mut adapter = DenseAdapter::new(features.view()).with_labels(&labels);
//! let dmat = SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, 0, DataSplitMode::Row, &NoopCommunicator)?;
//!
//! let ctx = Context::new(0)?;
//! let gidx = dmat.get_gradient_index(&ctx, &BatchParam::new(256, 0.2))?;
//! for page in gidx {
//!     println!("{} bins", page.cuts.total_bins());
//! }
//! dmat.save_to_local_file("train.dmatrix")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: types, errors, device context and collective primitives
//! - [`config`]: construction settings
//! - [`dataset`]: adapters, the canonical page, meta information and the
//!   derived page cache
//! - [`io`]: the binary container format

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    non_snake_case,
    non_upper_case_globals
)]

pub mod config;
pub mod core;
pub mod dataset;
pub mod io;

pub use crate::config::{DMatrixConfig, DMatrixConfigBuilder};
pub use crate::core::{
    constants::*,
    error::{DMatrixError, Result},
    types::*,
    VERSION,
};
pub use crate::dataset::{BatchParam, BatchSet, MetaInfo, SimpleDMatrix, SparsePage};

/// Commonly used items.
pub mod prelude {
    pub use crate::config::{DMatrixConfig, DMatrixConfigBuilder};
    pub use crate::core::collective::{Communicator, InMemoryCommunicator, NoopCommunicator};
    pub use crate::core::context::Context;
    pub use crate::core::error::{DMatrixError, Result};
    pub use crate::core::types::{DataSplitMode, DeviceOrd, Entry, FeatureType};
    pub use crate::dataset::{
        Adapter, ArrayAdapter, BatchParam, CatContainer, Column, ColumnarAdapter, CscAdapter,
        CsrAdapter, CsrBlock, DenseAdapter, FileAdapter, IteratorAdapter, MetaInfo, SimpleDMatrix,
        SparsePage,
    };
}

/// Install the `env_logger` backend.
///
/// Defaults the filter to `info` when `RUST_LOG` is unset. Calling it again,
/// or after another logger was installed, is a no-op.
///
/// ```rust
/// fn main() -> gbm_dmatrix::Result<()> {
///     gbm_dmatrix::init()?;
///     gbm_dmatrix::init()?;
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::debug!("gbm-dmatrix {} logging initialized", VERSION);
    }
    Ok(())
}
