//! Device and thread context.
//!
//! A [`Context`] carries the requested compute device and the number of worker
//! threads. The container uses it to decide where a derived page is
//! materialized and to run data-parallel build steps on a bounded rayon pool.

use crate::core::error::{DMatrixError, Result};
use crate::core::types::DeviceOrd;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::sync::Arc;

/// Device and thread configuration for a build step.
#[derive(Clone)]
pub struct Context {
    device: DeviceOrd,
    nthread: usize,
    pool: Arc<ThreadPool>,
}

impl Context {
    /// Create a host context with `nthread` threads (0 = all logical cores).
    pub fn new(nthread: usize) -> Result<Self> {
        Self::with_device(DeviceOrd::cpu(), nthread)
    }

    /// Create a context on `device` with `nthread` threads.
    pub fn with_device(device: DeviceOrd, nthread: usize) -> Result<Self> {
        let nthread = if nthread == 0 { num_cpus::get() } else { nthread };
        let pool = ThreadPoolBuilder::new()
            .num_threads(nthread)
            .thread_name(|i| format!("dmatrix-worker-{}", i))
            .build()
            .map_err(|e| DMatrixError::internal(format!("Failed to build thread pool: {}", e)))?;
        Ok(Context {
            device,
            nthread,
            pool: Arc::new(pool),
        })
    }

    /// The requested device.
    pub fn device(&self) -> DeviceOrd {
        self.device
    }

    /// Whether the requested device is a CUDA device.
    pub fn is_cuda(&self) -> bool {
        self.device.is_cuda()
    }

    /// Whether the requested device is the host.
    pub fn is_cpu(&self) -> bool {
        self.device.is_cpu()
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.nthread
    }

    /// A copy of this context placed on the host. Shares the thread pool.
    pub fn make_cpu(&self) -> Context {
        Context {
            device: DeviceOrd::cpu(),
            nthread: self.nthread,
            pool: Arc::clone(&self.pool),
        }
    }

    /// A copy of this context placed on a CUDA device.
    ///
    /// Keeps the current ordinal when already on CUDA, otherwise uses device 0.
    pub fn make_cuda(&self) -> Context {
        let ordinal = if self.is_cuda() { self.device.ordinal } else { 0 };
        Context {
            device: DeviceOrd::cuda(ordinal),
            nthread: self.nthread,
            pool: Arc::clone(&self.pool),
        }
    }

    /// Run `op` inside this context's thread pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("device", &self.device)
            .field("nthread", &self.nthread)
            .finish()
    }
}
