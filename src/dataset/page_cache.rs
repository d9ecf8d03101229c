//! Lazily built, reference-counted page slots.
//!
//! A [`PageCache`] holds at most one page of a kind. It moves through
//! `Absent -> Building -> Present`; a requester that finds the slot in
//! `Building` blocks until the build finishes. Pages are handed out as
//! `Arc` snapshots, so replacing a page never invalidates a reader.

use crate::core::error::{DMatrixError, Result};
use crate::dataset::batch_param::{check_empty, check_forbid_regen, regen_ghist, BatchParam};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

enum Slot<T> {
    Absent,
    Building,
    Present {
        page: Arc<T>,
        param: Option<BatchParam>,
    },
}

/// Single page slot with a build counter.
pub struct PageCache<T> {
    name: &'static str,
    slot: Mutex<Slot<T>>,
    cond: Condvar,
    builds: AtomicUsize,
}

/// Restores the previous slot if a build fails or panics.
struct BuildGuard<'a, T> {
    cache: &'a PageCache<T>,
    previous: Option<Slot<T>>,
}

impl<T> Drop for BuildGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Ok(mut slot) = self.cache.slot.lock() {
                *slot = previous;
            }
            self.cache.cond.notify_all();
        }
    }
}

impl<T> PageCache<T> {
    /// Empty slot named `name` in log messages.
    pub fn new(name: &'static str) -> Self {
        PageCache {
            name,
            slot: Mutex::new(Slot::Absent),
            cond: Condvar::new(),
            builds: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot<T>>> {
        self.slot
            .lock()
            .map_err(|_| DMatrixError::internal(format!("{} cache lock poisoned", self.name)))
    }

    /// Lock the slot, waiting out any build in progress.
    fn lock_settled(&self) -> Result<MutexGuard<'_, Slot<T>>> {
        let mut slot = self.lock()?;
        while matches!(*slot, Slot::Building) {
            slot = self
                .cond
                .wait(slot)
                .map_err(|_| DMatrixError::internal(format!("{} cache lock poisoned", self.name)))?;
        }
        Ok(slot)
    }

    /// Number of times a page has been built.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Whether a page is present.
    pub fn is_present(&self) -> bool {
        matches!(self.lock_settled().as_deref(), Ok(Slot::Present { .. }))
    }

    /// Parameters the present page was built with.
    pub fn cached_param(&self) -> Option<BatchParam> {
        match self.lock_settled().as_deref() {
            Ok(Slot::Present { param, .. }) => param.clone(),
            _ => None,
        }
    }

    /// Drop the present page. Outstanding snapshots stay valid.
    pub fn invalidate(&self) -> Result<()> {
        let mut slot = self.lock_settled()?;
        *slot = Slot::Absent;
        Ok(())
    }

    fn run_build<F>(
        &self,
        mut slot: MutexGuard<'_, Slot<T>>,
        param: Option<BatchParam>,
        build: F,
    ) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let previous = std::mem::replace(&mut *slot, Slot::Building);
        drop(slot);
        let mut guard = BuildGuard {
            cache: self,
            previous: Some(previous),
        };

        let page = match build() {
            Ok(page) => Arc::new(page),
            Err(err) => {
                log::debug!("{} page build failed ({}): {}", self.name, err.category(), err);
                return Err(err);
            }
        };

        let mut slot = self.lock()?;
        *slot = Slot::Present {
            page: Arc::clone(&page),
            param,
        };
        guard.previous = None;
        drop(slot);
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.cond.notify_all();
        Ok(page)
    }

    /// Return the page, building it on first use.
    pub fn get_or_build<F>(&self, build: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let slot = self.lock_settled()?;
        if let Slot::Present { page, .. } = &*slot {
            return Ok(Arc::clone(page));
        }
        log::debug!("Building {} page", self.name);
        self.run_build(slot, None, build)
    }

    /// Return the page built for `param`, rebuilding it when stale.
    ///
    /// An uninitialized `param` reuses the present page and fails when there
    /// is none. With `forbid_regen` a stale page is an error and nothing is
    /// rebuilt.
    pub fn get_with_param<F>(&self, param: &BatchParam, build: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let slot = self.lock_settled()?;
        match &*slot {
            Slot::Present {
                page,
                param: Some(old),
            } => {
                check_empty(Some(old), param)?;
                if param.initialized() && param.forbid_regen {
                    check_forbid_regen(old, param)?;
                }
                if !regen_ghist(old, param) {
                    return Ok(Arc::clone(page));
                }
                log::info!(
                    "Regenerating {} page: max_bin {} -> {}",
                    self.name,
                    old.max_bin,
                    param.max_bin
                );
            }
            Slot::Present { page, param: None } => {
                if !param.initialized() {
                    return Ok(Arc::clone(page));
                }
            }
            _ => check_empty(None, param)?,
        }
        self.run_build(slot, Some(param.make_cache()), build)
    }
}

impl<T> fmt::Debug for PageCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCache")
            .field("name", &self.name)
            .field("builds", &self.build_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_build_once() {
        let cache = PageCache::new("column");
        let a = cache.get_or_build(|| Ok(vec![1, 2, 3])).unwrap();
        let b = cache.get_or_build(|| Ok(vec![9])).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.build_count(), 1);
        assert!(cache.is_present());
    }

    #[test]
    fn test_failed_build_restores_absent() {
        let cache: PageCache<Vec<i32>> = PageCache::new("column");
        assert!(cache
            .get_or_build(|| Err(DMatrixError::internal("boom")))
            .is_err());
        assert!(!cache.is_present());
        assert_eq!(cache.build_count(), 0);
        assert!(cache.get_or_build(|| Ok(vec![1])).is_ok());
    }

    #[test]
    fn test_param_regeneration() {
        let cache = PageCache::new("gradient index");
        let p16 = BatchParam::new(16, 0.2);
        let first = cache.get_with_param(&p16, || Ok(16)).unwrap();
        let again = cache.get_with_param(&p16, || Ok(-1)).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.build_count(), 1);

        let p32 = BatchParam::new(32, 0.2);
        let rebuilt = cache.get_with_param(&p32, || Ok(32)).unwrap();
        assert_eq!(*rebuilt, 32);
        assert_eq!(*first, 16);
        assert_eq!(cache.build_count(), 2);
        assert_eq!(cache.cached_param().unwrap().max_bin, 32);

        let reused = cache.get_with_param(&BatchParam::default(), || Ok(-1)).unwrap();
        assert_eq!(*reused, 32);
    }

    #[test]
    fn test_forbid_regen_never_rebuilds() {
        let cache = PageCache::new("ellpack");
        cache.get_with_param(&BatchParam::new(16, 0.2), || Ok(1)).unwrap();
        let err = cache
            .get_with_param(&BatchParam::new(32, 0.2).forbid_regen(true), || Ok(2))
            .unwrap_err();
        assert!(matches!(err, DMatrixError::InconsistentMaxBin { .. }));
        assert_eq!(cache.build_count(), 1);
        assert_eq!(cache.cached_param().unwrap().max_bin, 16);
    }

    #[test]
    fn test_invalidate_keeps_snapshots() {
        let cache = PageCache::new("gradient index");
        let p16 = BatchParam::new(16, 0.2);
        let before = cache.get_with_param(&p16, || Ok(vec![1, 2])).unwrap();
        cache.invalidate().unwrap();
        assert!(!cache.is_present());
        assert!(cache.cached_param().is_none());
        assert_eq!(*before, vec![1, 2]);

        // an uninitialized request no longer has a page to reuse
        assert!(matches!(
            cache.get_with_param(&BatchParam::default(), || Ok(vec![0])),
            Err(DMatrixError::UninitializedBatchParam)
        ));
        let after = cache.get_with_param(&p16, || Ok(vec![3])).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(cache.build_count(), 2);
    }

    #[test]
    fn test_uninitialized_without_page() {
        let cache: PageCache<i32> = PageCache::new("gradient index");
        assert!(matches!(
            cache.get_with_param(&BatchParam::default(), || Ok(1)),
            Err(DMatrixError::UninitializedBatchParam)
        ));
    }

    #[test]
    fn test_concurrent_requesters_share_one_build() {
        let cache = Arc::new(PageCache::new("column"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache
                        .get_or_build(|| {
                            thread::sleep(Duration::from_millis(20));
                            Ok(7usize)
                        })
                        .unwrap()
                })
            })
            .collect();
        let pages: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.build_count(), 1);
        assert!(pages.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
