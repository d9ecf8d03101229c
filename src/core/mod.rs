//! Core infrastructure shared by the container and its derived pages.
//!
//! - [`types`]: entries, index aliases, device ordinals and split modes
//! - [`constants`]: binary format tags and defaults
//! - [`error`]: the crate-wide error type
//! - [`context`]: device and thread context
//! - [`collective`]: cross-worker primitives
//! - [`utils`]: block partitioning for parallel build steps

pub mod collective;
pub mod constants;
pub mod context;
pub mod error;
pub mod types;
pub mod utils;

pub use collective::{Communicator, InMemoryCommunicator, NoopCommunicator, ReduceOp};
pub use context::Context;
pub use error::{DMatrixError, Result};
pub use types::*;

/// Version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
