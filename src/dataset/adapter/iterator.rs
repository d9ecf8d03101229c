//! Legacy callback adapter.

use super::{Adapter, AdapterKind, Batch, CsrBlock};
use crate::core::error::Result;
use crate::core::types::ADAPTER_UNKNOWN_SIZE;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type ResetFn = Box<dyn FnMut() + Send>;
type NextFn = Box<dyn FnMut() -> anyhow::Result<Option<CsrBlock>> + Send>;

/// Adapter driven by user callbacks.
///
/// `next_block` returns successive CSR blocks until `None`; `reset` rewinds
/// the underlying source. Errors from the callback surface as
/// [`DMatrixError::External`](crate::core::error::DMatrixError::External).
pub struct IteratorAdapter {
    reset: ResetFn,
    next_block: NextFn,
    block: CsrBlock,
}

impl IteratorAdapter {
    /// Create an adapter from a reset and a next-block callback.
    pub fn new<R, N>(reset: R, next_block: N) -> Self
    where
        R: FnMut() + Send + 'static,
        N: FnMut() -> anyhow::Result<Option<CsrBlock>> + Send + 'static,
    {
        IteratorAdapter {
            reset: Box::new(reset),
            next_block: Box::new(next_block),
            block: CsrBlock::new(),
        }
    }

    /// Adapter replaying a fixed list of blocks.
    pub fn from_blocks(blocks: Vec<CsrBlock>) -> Self {
        let cursor = Arc::new(AtomicUsize::new(0));
        let reset_cursor = Arc::clone(&cursor);
        IteratorAdapter::new(
            move || reset_cursor.store(0, Ordering::SeqCst),
            move || {
                let i = cursor.fetch_add(1, Ordering::SeqCst);
                Ok(blocks.get(i).cloned())
            },
        )
    }
}

impl std::fmt::Debug for IteratorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IteratorAdapter")
            .field("current_rows", &self.block.num_rows())
            .finish()
    }
}

impl Adapter for IteratorAdapter {
    fn before_first(&mut self) -> Result<()> {
        (self.reset)();
        self.block = CsrBlock::new();
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        match (self.next_block)()? {
            Some(block) => {
                self.block = block;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn value(&self) -> Batch<'_> {
        self.block.as_batch()
    }

    fn num_rows(&self) -> u64 {
        ADAPTER_UNKNOWN_SIZE
    }

    fn num_columns(&self) -> u64 {
        ADAPTER_UNKNOWN_SIZE
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Iterator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DMatrixError;

    fn block(rows: usize) -> CsrBlock {
        let mut b = CsrBlock::new();
        for r in 0..rows {
            b.push_row(vec![(r as u32, 1.0)]);
        }
        b
    }

    #[test]
    fn test_replay_blocks() {
        let mut adapter = IteratorAdapter::from_blocks(vec![block(2), block(3)]);
        adapter.before_first().unwrap();
        assert!(adapter.next().unwrap());
        assert_eq!(adapter.value().size(), 2);
        assert!(adapter.next().unwrap());
        assert_eq!(adapter.value().size(), 3);
        assert!(!adapter.next().unwrap());

        adapter.before_first().unwrap();
        assert!(adapter.next().unwrap());
        assert_eq!(adapter.value().size(), 2);
    }

    #[test]
    fn test_callback_error_is_external() {
        let mut adapter = IteratorAdapter::new(|| {}, || Err(anyhow::anyhow!("source closed")));
        let err = adapter.next().unwrap_err();
        assert!(matches!(err, DMatrixError::External { .. }));
        assert!(err.is_recoverable());
    }
}
