//! Block partitioning for data-parallel build steps.
//!
//! Build steps split their input rows into contiguous blocks, one unit of
//! rayon work per block. Each block's output is independent, so the caller
//! blocks until all of them complete and no task scheduling is involved.

use rayon::prelude::*;
use std::cmp::min;
use std::ops::Range;

/// Threading helpers for the block-parallel loops.
#[derive(Debug)]
pub struct Threading;

impl Threading {
    /// Compute number of blocks and block size for `cnt` items.
    ///
    /// Never produces more blocks than `num_threads`, and never blocks smaller
    /// than `min_cnt_per_block` unless there is only one block.
    pub fn block_info(num_threads: usize, cnt: usize, min_cnt_per_block: usize) -> (usize, usize) {
        let min_cnt_per_block = min_cnt_per_block.max(1);
        let n = min(
            num_threads.max(1),
            (cnt + min_cnt_per_block - 1) / min_cnt_per_block,
        );
        if n > 1 {
            (n, (cnt + n - 1) / n)
        } else {
            (1, cnt)
        }
    }

    /// Split `[0, cnt)` into the ranges computed by [`Threading::block_info`].
    pub fn blocks(num_threads: usize, cnt: usize, min_cnt_per_block: usize) -> Vec<Range<usize>> {
        let (n_block, block_size) = Self::block_info(num_threads, cnt, min_cnt_per_block);
        if block_size == 0 {
            return vec![0..0];
        }
        (0..n_block)
            .map(|i| {
                let start = min(cnt, i * block_size);
                let end = min(cnt, start + block_size);
                start..end
            })
            .collect()
    }

    /// Run `inner_fun(block_id, range)` for every block in parallel and
    /// collect the results in block order.
    pub fn map_blocks<R, F>(
        num_threads: usize,
        cnt: usize,
        min_cnt_per_block: usize,
        inner_fun: F,
    ) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, Range<usize>) -> R + Send + Sync,
    {
        Self::blocks(num_threads, cnt, min_cnt_per_block)
            .into_par_iter()
            .enumerate()
            .map(|(i, range)| inner_fun(i, range))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_info_small_input() {
        assert_eq!(Threading::block_info(8, 10, 100), (1, 10));
        assert_eq!(Threading::block_info(8, 0, 100), (1, 0));
    }

    #[test]
    fn test_block_info_splits() {
        let (n, size) = Threading::block_info(4, 1000, 100);
        assert_eq!(n, 4);
        assert_eq!(size, 250);
    }

    #[test]
    fn test_blocks_cover_range() {
        let blocks = Threading::blocks(3, 1001, 10);
        assert_eq!(blocks.first().unwrap().start, 0);
        assert_eq!(blocks.last().unwrap().end, 1001);
        for w in blocks.windows(2) {
            assert_eq!(w[0].end, w[1].start);
        }
    }

    #[test]
    fn test_map_blocks_in_order() {
        let sums = Threading::map_blocks(4, 100, 10, |_, r| r.sum::<usize>());
        assert_eq!(sums.iter().sum::<usize>(), (0..100).sum::<usize>());
    }
}
