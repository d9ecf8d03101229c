//! Persistence of the in-memory container.

pub mod binary;

pub use self::binary::{read_dmatrix, write_dmatrix};
