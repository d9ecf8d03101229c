//! In-memory training data container.
//!
//! [`SimpleDMatrix`] owns one canonical row-major page and the meta
//! information describing it. Every other representation (column pages,
//! value-sorted column pages, the histogram index and the ellpack page) is
//! derived from the canonical page on first request and cached. The quantized
//! pages are rebuilt when a request carries different binning parameters.
//!
//! # Example
//!
//! ```rust,no_run
//! use gbm_dmatrix::prelude::*;
//!
//! # fn main() -> gbm_dmatrix::Result<()> {
//! let offset = [0usize, 1, 1, 3];
//! let indices = [1u32, 0, 3];
//! let values = [5.0f32, 2.0, 1.0];
//! let mut adapter = CsrAdapter::new(&offset, &indices, &values, Some(4))?;
//! let dmat = SimpleDMatrix::from_adapter(&mut adapter, f32::NAN, 1, DataSplitMode::Row, &NoopCommunicator)?;
//!
//! let ctx = Context::new(1)?;
//! for page in dmat.get_gradient_index(&ctx, &BatchParam::new(16, 0.2))? {
//!     println!("{} rows, {} bins", page.size(), page.cuts.total_bins());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::DMatrixConfig;
use crate::core::collective::{check_consistent_across_workers, exclusive_prefix_sum, Communicator};
use crate::core::constants::DEFAULT_NUM_THREADS;
use crate::core::context::Context;
use crate::core::error::{DMatrixError, Result};
use crate::core::types::{DataSplitMode, ADAPTER_UNKNOWN_SIZE};
use crate::dataset::adapter::columnar::recode_columns;
use crate::dataset::adapter::{Adapter, Batch, BatchData, Column, FileAdapter};
use crate::dataset::batch_param::BatchParam;
use crate::dataset::batch_set::BatchSet;
use crate::dataset::ellpack::EllpackPage;
use crate::dataset::gradient_index::GHistIndexMatrix;
use crate::dataset::meta::MetaInfo;
use crate::dataset::page_cache::PageCache;
use crate::dataset::placement::{ellpack_context, ghist_context};
use crate::dataset::sparse_page::{CscPage, ExtSparsePage, SortedCscPage, SparsePage};
use crate::io::binary::{read_dmatrix, write_dmatrix};
use crate::{dataset_error, meta_error};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Number of times each derived page has been built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildCounts {
    /// Column pages
    pub column: usize,
    /// Value-sorted column pages
    pub sorted_column: usize,
    /// Histogram index pages
    pub gradient_index: usize,
    /// Ellpack pages
    pub ellpack: usize,
}

/// Running state of the ranking groups while batches are absorbed.
#[derive(Debug, Default)]
struct GroupBuilder {
    last_qid: Option<u64>,
    rows: u32,
}

impl GroupBuilder {
    fn push(&mut self, qid: &[u64], group_ptr: &mut Vec<u32>) {
        if group_ptr.is_empty() {
            group_ptr.push(0);
        }
        for &q in qid {
            if self.last_qid != Some(q) {
                if group_ptr.last().map_or(true, |&start| self.rows > start) {
                    group_ptr.push(self.rows);
                }
                self.last_qid = Some(q);
            }
            self.rows += 1;
        }
    }

    fn finish(&self, group_ptr: &mut Vec<u32>) {
        if self.last_qid.is_some() && group_ptr.last().map_or(false, |&start| self.rows > start) {
            group_ptr.push(self.rows);
        }
    }
}

/// Canonical in-memory matrix with lazily derived pages.
pub struct SimpleDMatrix {
    info: MetaInfo,
    sparse_page: Arc<SparsePage>,
    column_page: PageCache<CscPage>,
    sorted_column_page: PageCache<SortedCscPage>,
    gradient_index: PageCache<GHistIndexMatrix>,
    ellpack_page: PageCache<EllpackPage>,
    fmat_ctx: Context,
}

impl SimpleDMatrix {
    fn from_parts(info: MetaInfo, page: SparsePage, fmat_ctx: Context) -> Self {
        SimpleDMatrix {
            info,
            sparse_page: Arc::new(page),
            column_page: PageCache::new("column"),
            sorted_column_page: PageCache::new("sorted column"),
            gradient_index: PageCache::new("gradient index"),
            ellpack_page: PageCache::new("ellpack"),
            fmat_ctx,
        }
    }

    /// Build a host matrix from `adapter`.
    ///
    /// Values that are NaN or equal to `missing` are not stored. `nthread`
    /// of 0 uses every logical core.
    pub fn from_adapter<A>(
        adapter: &mut A,
        missing: f32,
        nthread: usize,
        split_mode: DataSplitMode,
        comm: &dyn Communicator,
    ) -> Result<Self>
    where
        A: Adapter + ?Sized,
    {
        let ctx = Context::new(nthread)?;
        Self::ingest(adapter, missing, ctx, split_mode, comm)
    }

    /// Build a matrix from `adapter` with the settings of `config`.
    ///
    /// The configured device becomes the construction device consulted when
    /// placing quantized pages.
    pub fn from_config<A>(adapter: &mut A, config: &DMatrixConfig, comm: &dyn Communicator) -> Result<Self>
    where
        A: Adapter + ?Sized,
    {
        config.validate()?;
        let ctx = Context::with_device(config.device, config.nthread)?;
        Self::ingest(adapter, config.missing, ctx, config.data_split_mode, comm)
    }

    /// Build a matrix from a LibSVM or CSV text file.
    pub fn from_text_file<P: AsRef<Path>>(
        path: P,
        config: &DMatrixConfig,
        comm: &dyn Communicator,
    ) -> Result<Self> {
        let mut adapter = FileAdapter::open(path)?.with_chunk_rows(config.file_chunk_rows);
        Self::from_config(&mut adapter, config, comm)
    }

    fn ingest<A>(
        adapter: &mut A,
        missing: f32,
        ctx: Context,
        split_mode: DataSplitMode,
        comm: &dyn Communicator,
    ) -> Result<Self>
    where
        A: Adapter + ?Sized,
    {
        let nthread = ctx.threads();
        let ref_cats = adapter.ref_categories().cloned();

        let mut page = SparsePage::new();
        let mut info = MetaInfo::new();
        let mut groups = GroupBuilder::default();
        let mut inferred_cols = 0u64;
        let mut total_batch_size = 0u64;

        adapter.before_first()?;
        while adapter.next()? {
            let batch = adapter.value();
            let batch_cols = match (&ref_cats, batch.data) {
                (Some(reference), BatchData::Columns { columns, num_rows }) => {
                    let encoded = recode_columns(columns, reference);
                    let recoded: Vec<Column<'_>> =
                        encoded.iter().map(|c| Column::Numeric(c.as_slice())).collect();
                    let batch = Batch {
                        data: BatchData::Columns {
                            columns: &recoded,
                            num_rows,
                        },
                        meta: batch.meta,
                    };
                    ctx.install(|| page.push(&batch, missing, nthread))?
                }
                _ => ctx.install(|| page.push(&batch, missing, nthread))?,
            };
            inferred_cols = inferred_cols.max(batch_cols);

            let rows_before = total_batch_size as usize;
            let meta = batch.meta;
            if let Some(labels) = meta.labels {
                info.labels.extend_from_slice(labels);
            }
            if let Some(weights) = meta.weights {
                if info.weights.len() < rows_before {
                    info.weights.resize(rows_before, 1.0);
                }
                info.weights.extend_from_slice(weights);
            }
            if let Some(base_margin) = meta.base_margin {
                info.base_margin.extend_from_slice(base_margin);
            }
            match meta.qid {
                Some(qid) => groups.push(qid, &mut info.group_ptr),
                None if groups.last_qid.is_some() && batch.size() > 0 => {
                    return Err(meta_error!(
                        "Group ids are missing for a batch of {} rows after grouped rows",
                        batch.size()
                    ));
                }
                None => {}
            }
            total_batch_size += batch.size() as u64;
        }
        groups.finish(&mut info.group_ptr);

        let adapter_cols = adapter.num_columns();
        info.num_col = if adapter_cols == ADAPTER_UNKNOWN_SIZE {
            inferred_cols
        } else {
            if inferred_cols > adapter_cols {
                return Err(dataset_error!(
                    "Data has {} columns but the adapter declares {}",
                    inferred_cols,
                    adapter_cols
                ));
            }
            adapter_cols
        };

        let cats = match ref_cats {
            Some(reference) => Some(reference),
            None => adapter.categories(),
        };
        if let Some(cats) = cats {
            if cats.has_categorical() && cats.num_features() as u64 == info.num_col {
                info.feature_types = cats.feature_types();
            }
            info.set_cats(Arc::new(cats));
        }

        Self::reindex_features(&ctx, comm, split_mode, &mut page, info.num_col)?;
        info.synchronize_number_of_columns(comm, split_mode)?;
        if split_mode == DataSplitMode::Row {
            check_consistent_across_workers(comm, "categories", &info.cats().fingerprint()?)?;
        }

        let adapter_rows = adapter.num_rows();
        if adapter_rows == ADAPTER_UNKNOWN_SIZE {
            let kind = adapter.kind();
            if kind.infers_rows_from_batches() {
                page.pad_rows(total_batch_size as usize);
                info.num_row = total_batch_size;
            } else if kind.infers_rows_from_offsets() {
                info.num_row = page.size() as u64;
            } else {
                return Err(DMatrixError::UnknownRowCount {
                    kind: kind.to_string(),
                });
            }
        } else {
            page.pad_rows(adapter_rows as usize);
            info.num_row = adapter_rows;
        }
        if page.size() as u64 != info.num_row {
            return Err(dataset_error!(
                "Ingested {} rows, expected {}",
                page.size(),
                info.num_row
            ));
        }
        info.num_nonzero = page.num_nonzero();

        if !info.weights.is_empty() && info.group_ptr.is_empty() && (info.weights.len() as u64) < info.num_row {
            info.weights.resize(info.num_row as usize, 1.0);
        }

        if !ctx.install(|| page.is_indices_sorted()) {
            log::debug!("Sorting row entries by column index");
            ctx.install(|| page.sort_indices());
        }

        if info.num_row == 0 {
            log::warn!("Empty dataset at worker: {}", comm.rank());
        }
        info.validate(ctx.device())?;

        log::info!(
            "{}x{} matrix with {} entries loaded from {} adapter",
            info.num_row,
            info.num_col,
            info.num_nonzero,
            adapter.kind()
        );
        Ok(Self::from_parts(info, page, ctx))
    }

    /// Shift local column indices so that workers of a column split own
    /// disjoint, consecutive column ranges.
    fn reindex_features(
        ctx: &Context,
        comm: &dyn Communicator,
        split_mode: DataSplitMode,
        page: &mut SparsePage,
        num_col: u64,
    ) -> Result<()> {
        if split_mode != DataSplitMode::Col || !comm.is_distributed() {
            return Ok(());
        }
        let offset = exclusive_prefix_sum(comm, num_col)?;
        if offset == 0 {
            return Ok(());
        }
        log::debug!("Worker {} shifts feature indices by {}", comm.rank(), offset);
        ctx.install(|| page.reindex(offset))
    }

    /// Meta information.
    pub fn info(&self) -> &MetaInfo {
        &self.info
    }

    /// Context the matrix was built with.
    pub fn ctx(&self) -> &Context {
        &self.fmat_ctx
    }

    /// The matrix always holds a single column block.
    pub fn single_col_block(&self) -> bool {
        true
    }

    /// Whether every row stores every column.
    pub fn is_dense(&self) -> bool {
        self.info.num_nonzero == self.info.num_row * self.info.num_col
    }

    /// Build counters of the derived pages.
    pub fn build_counts(&self) -> BuildCounts {
        BuildCounts {
            column: self.column_page.build_count(),
            sorted_column: self.sorted_column_page.build_count(),
            gradient_index: self.gradient_index.build_count(),
            ellpack: self.ellpack_page.build_count(),
        }
    }

    /// Whether a histogram index page is cached.
    pub fn gradient_index_exists(&self) -> bool {
        self.gradient_index.is_present()
    }

    /// Whether an ellpack page is cached.
    pub fn ellpack_exists(&self) -> bool {
        self.ellpack_page.is_present()
    }

    /// Whether a column page is cached.
    pub fn column_page_exists(&self) -> bool {
        self.column_page.is_present()
    }

    /// The canonical page.
    pub fn get_row_batches(&self) -> BatchSet<SparsePage> {
        BatchSet::single(Arc::clone(&self.sparse_page))
    }

    /// The canonical page behind an external wrapper.
    pub fn get_ext_batches(&self) -> BatchSet<ExtSparsePage> {
        BatchSet::single(Arc::new(ExtSparsePage {
            page: Arc::clone(&self.sparse_page),
        }))
    }

    fn transpose(&self, ctx: &Context) -> Result<SparsePage> {
        ctx.install(|| {
            self.sparse_page
                .get_transpose(self.info.num_col as usize, ctx.threads())
        })
    }

    /// Column-major page, built once.
    pub fn get_column_batches(&self, ctx: &Context) -> Result<BatchSet<CscPage>> {
        let page = self
            .column_page
            .get_or_build(|| self.transpose(ctx).map(CscPage))?;
        Ok(BatchSet::single(page))
    }

    /// Column-major page with every column sorted by value, built once.
    pub fn get_sorted_column_batches(&self, ctx: &Context) -> Result<BatchSet<SortedCscPage>> {
        let page = self.sorted_column_page.get_or_build(|| {
            let mut csc = self.transpose(ctx)?;
            ctx.install(|| csc.sort_rows());
            Ok(SortedCscPage(csc))
        })?;
        Ok(BatchSet::single(page))
    }

    /// Histogram index page for `param`; rebuilt when the parameters changed.
    pub fn get_gradient_index(
        &self,
        ctx: &Context,
        param: &BatchParam,
    ) -> Result<BatchSet<GHistIndexMatrix>> {
        let page = self.gradient_index.get_with_param(param, || {
            let (build_ctx, placement) = ghist_context(ctx, &self.fmat_ctx);
            log::debug!("Gradient index placed on {} ({:?})", build_ctx.device(), placement);
            let csc = self.transpose(&build_ctx)?;
            GHistIndexMatrix::new(&build_ctx, &self.sparse_page, &csc, &self.info, param)
        })?;
        Ok(BatchSet::single(page))
    }

    /// Ellpack page for `param`; rebuilt when the parameters changed.
    pub fn get_ellpack_batches(&self, ctx: &Context, param: &BatchParam) -> Result<BatchSet<EllpackPage>> {
        let page = self.ellpack_page.get_with_param(param, || {
            let (build_ctx, placement) = ellpack_context(ctx, &self.fmat_ctx);
            log::debug!("Ellpack page placed on {} ({:?})", build_ctx.device(), placement);
            let csc = self.transpose(&build_ctx)?;
            EllpackPage::new(&build_ctx, &self.sparse_page, &csc, &self.info, param)
        })?;
        Ok(BatchSet::single(page))
    }

    /// New matrix holding the rows in `ridx`, in that order.
    ///
    /// Duplicates are allowed. Category dictionaries are shared with `self`.
    pub fn slice(&self, ridx: &[usize]) -> Result<SimpleDMatrix> {
        let page = self
            .fmat_ctx
            .install(|| self.sparse_page.select_rows(ridx))?;
        let info = self.info.slice(&self.fmat_ctx, ridx, page.num_nonzero())?;
        Ok(Self::from_parts(info, page, self.fmat_ctx.clone()))
    }

    /// New matrix holding slice `slice_id` of `num_slices` contiguous column
    /// ranges. The last slice takes the remainder. Column indices are kept.
    pub fn slice_col(&self, num_slices: usize, slice_id: usize) -> Result<SimpleDMatrix> {
        if self.info.has_categorical() {
            return Err(DMatrixError::CategoricalColumnSlice);
        }
        if num_slices == 0 || slice_id >= num_slices {
            return Err(DMatrixError::invalid_parameter(
                "slice_id",
                format!("{}/{}", slice_id, num_slices),
                "slice id must be below a non-zero number of slices",
            ));
        }
        let num_col = self.info.num_col;
        let slice_size = num_col / num_slices as u64;
        let start = slice_size * slice_id as u64;
        let end = if slice_id == num_slices - 1 {
            num_col
        } else {
            start + slice_size
        };

        let page = self
            .fmat_ctx
            .install(|| self.sparse_page.filter_columns(start..end));
        let mut info = self.info.copy();
        info.num_nonzero = page.num_nonzero();
        info.data_split_mode = DataSplitMode::Col;
        log::debug!(
            "Column slice {}/{}: columns [{}, {}), {} entries",
            slice_id,
            num_slices,
            start,
            end,
            info.num_nonzero
        );
        Ok(Self::from_parts(info, page, self.fmat_ctx.clone()))
    }

    /// Write the binary form.
    pub fn save_binary<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_dmatrix(writer, &self.info, &self.sparse_page)
    }

    /// Write the binary form to `path`.
    pub fn save_to_local_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.save_binary(&mut writer)?;
        log::info!(
            "{}x{} matrix with {} entries saved to {}",
            self.info.num_row,
            self.info.num_col,
            self.info.num_nonzero,
            path.display()
        );
        Ok(())
    }

    /// Read a matrix written by [`SimpleDMatrix::save_binary`].
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let (info, page) = read_dmatrix(reader)?;
        let ctx = Context::new(DEFAULT_NUM_THREADS)?;
        Ok(Self::from_parts(info, page, ctx))
    }

    /// Read a matrix written by [`SimpleDMatrix::save_to_local_file`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let dmat = Self::from_reader(&mut reader)?;
        log::info!(
            "{}x{} matrix with {} entries loaded from {}",
            dmat.info.num_row,
            dmat.info.num_col,
            dmat.info.num_nonzero,
            path.display()
        );
        Ok(dmat)
    }
}

impl std::fmt::Debug for SimpleDMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleDMatrix")
            .field("num_row", &self.info.num_row)
            .field("num_col", &self.info.num_col)
            .field("num_nonzero", &self.info.num_nonzero)
            .field("device", &self.fmat_ctx.device())
            .field("builds", &self.build_counts())
            .finish()
    }
}
