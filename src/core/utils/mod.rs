//! Small utilities shared by the build steps.

pub mod threading;

pub use threading::Threading;
