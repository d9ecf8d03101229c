//! Training data container and its page representations.
//!
//! Data enters through an [`adapter`], is stored once as a canonical
//! [`SparsePage`] inside a [`SimpleDMatrix`], and is served as column pages,
//! value-sorted column pages, histogram index pages or ellpack pages on
//! request.

pub mod adapter;
pub mod batch_param;
pub mod batch_set;
pub mod categories;
pub mod ellpack;
pub mod gradient_index;
pub mod meta;
pub mod page_cache;
pub mod placement;
pub mod quantile;
pub mod simple_dmatrix;
pub mod sparse_page;

pub use adapter::{
    Adapter, AdapterKind, ArrayAdapter, Batch, BatchData, BatchMeta, Column, ColumnarAdapter,
    CscAdapter, CsrAdapter, CsrBlock, DenseAdapter, FileAdapter, FileFormat, IteratorAdapter,
};
pub use batch_param::BatchParam;
pub use batch_set::BatchSet;
pub use categories::CatContainer;
pub use ellpack::EllpackPage;
pub use gradient_index::{ColumnType, GHistIndexMatrix};
pub use meta::MetaInfo;
pub use page_cache::PageCache;
pub use placement::Placement;
pub use quantile::HistogramCuts;
pub use simple_dmatrix::{BuildCounts, SimpleDMatrix};
pub use sparse_page::{CscPage, ExtSparsePage, SortedCscPage, SparsePage};
