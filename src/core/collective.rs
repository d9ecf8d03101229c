//! Collective communication primitives.
//!
//! The container only needs a handful of blocking collectives: allgather of
//! per-worker column counts, allreduce of the agreed column count, and
//! broadcast-and-compare consistency checks. Every worker must issue these
//! calls in the same order; a mismatch deadlocks or aborts the job.
//!
//! Two implementations are provided: [`NoopCommunicator`] for a single worker
//! and [`InMemoryCommunicator`], a rendezvous shared by threads of one process
//! that stands in for a real transport.

use crate::core::error::{DMatrixError, Result};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

/// Reduction applied by [`Communicator::allreduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Element-wise maximum
    Max,
    /// Element-wise minimum
    Min,
    /// Element-wise sum
    Sum,
}

impl ReduceOp {
    fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
            ReduceOp::Sum => a.wrapping_add(b),
        }
    }
}

/// Blocking collective operations across the workers of a job.
pub trait Communicator: Send + Sync + fmt::Debug {
    /// Rank of this worker.
    fn rank(&self) -> usize;

    /// Number of workers.
    fn world_size(&self) -> usize;

    /// Whether more than one worker participates.
    fn is_distributed(&self) -> bool {
        self.world_size() > 1
    }

    /// Gather one slot per worker. On entry `buffer[rank]` holds this worker's
    /// value; on return every slot is filled. `buffer.len()` must equal the
    /// world size.
    fn allgather(&self, buffer: &mut [u64]) -> Result<()>;

    /// Reduce `buffer` element-wise across workers, result on every worker.
    fn allreduce(&self, buffer: &mut [u64], op: ReduceOp) -> Result<()>;

    /// Replace `buffer` on every worker with the contents held by `root`.
    fn broadcast(&self, buffer: &mut Vec<u8>, root: usize) -> Result<()>;
}

/// Single worker communicator. Every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCommunicator;

impl Communicator for NoopCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn allgather(&self, buffer: &mut [u64]) -> Result<()> {
        if buffer.len() != 1 {
            return Err(DMatrixError::collective(
                "allgather",
                format!("buffer has {} slots for a world of size 1", buffer.len()),
            ));
        }
        Ok(())
    }

    fn allreduce(&self, _buffer: &mut [u64], _op: ReduceOp) -> Result<()> {
        Ok(())
    }

    fn broadcast(&self, _buffer: &mut Vec<u8>, root: usize) -> Result<()> {
        if root != 0 {
            return Err(DMatrixError::collective(
                "broadcast",
                format!("root {} out of range for a world of size 1", root),
            ));
        }
        Ok(())
    }
}

struct ExchangeState {
    generation: u64,
    arrived: usize,
    slots: Vec<Option<Vec<u8>>>,
    gathered: Arc<Vec<Vec<u8>>>,
}

fn poisoned(op: &str) -> DMatrixError {
    DMatrixError::collective(op, "a worker panicked during the exchange")
}

struct Rendezvous {
    world_size: usize,
    state: Mutex<ExchangeState>,
    cond: Condvar,
}

impl Rendezvous {
    /// Deposit `payload` for `rank` and block until every worker has done the
    /// same, then return all payloads ordered by rank.
    fn exchange(&self, op: &str, rank: usize, payload: Vec<u8>) -> Result<Arc<Vec<Vec<u8>>>> {
        let mut state = self.state.lock().map_err(|_| poisoned(op))?;
        let generation = state.generation;
        state.slots[rank] = Some(payload);
        state.arrived += 1;

        if state.arrived == self.world_size {
            let gathered: Vec<Vec<u8>> = state
                .slots
                .iter_mut()
                .map(|slot| slot.take().unwrap_or_default())
                .collect();
            state.gathered = Arc::new(gathered);
            state.arrived = 0;
            state.generation += 1;
            self.cond.notify_all();
            return Ok(Arc::clone(&state.gathered));
        }

        while state.generation == generation {
            state = self.cond.wait(state).map_err(|_| poisoned(op))?;
        }
        Ok(Arc::clone(&state.gathered))
    }
}

/// Communicator for workers running as threads of the same process.
#[derive(Clone)]
pub struct InMemoryCommunicator {
    rank: usize,
    rendezvous: Arc<Rendezvous>,
}

impl InMemoryCommunicator {
    /// Create one communicator per worker, ordered by rank.
    pub fn group(world_size: usize) -> Vec<InMemoryCommunicator> {
        let world_size = world_size.max(1);
        let rendezvous = Arc::new(Rendezvous {
            world_size,
            state: Mutex::new(ExchangeState {
                generation: 0,
                arrived: 0,
                slots: vec![None; world_size],
                gathered: Arc::new(Vec::new()),
            }),
            cond: Condvar::new(),
        });
        (0..world_size)
            .map(|rank| InMemoryCommunicator {
                rank,
                rendezvous: Arc::clone(&rendezvous),
            })
            .collect()
    }
}

fn encode_u64s(values: &[u64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_u64s(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            u64::from_le_bytes(raw)
        })
        .collect()
}

impl Communicator for InMemoryCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.rendezvous.world_size
    }

    fn allgather(&self, buffer: &mut [u64]) -> Result<()> {
        if buffer.len() != self.world_size() {
            return Err(DMatrixError::collective(
                "allgather",
                format!(
                    "buffer has {} slots for a world of size {}",
                    buffer.len(),
                    self.world_size()
                ),
            ));
        }
        let mine = buffer[self.rank].to_le_bytes().to_vec();
        let gathered = self.rendezvous.exchange("allgather", self.rank, mine)?;
        for (slot, bytes) in buffer.iter_mut().zip(gathered.iter()) {
            *slot = decode_u64s(bytes).first().copied().unwrap_or_default();
        }
        Ok(())
    }

    fn allreduce(&self, buffer: &mut [u64], op: ReduceOp) -> Result<()> {
        let gathered = self
            .rendezvous
            .exchange("allreduce", self.rank, encode_u64s(buffer))?;
        for (worker, bytes) in gathered.iter().enumerate() {
            let values = decode_u64s(bytes);
            if values.len() != buffer.len() {
                return Err(DMatrixError::collective(
                    "allreduce",
                    format!(
                        "worker {} sent {} values, expected {}",
                        worker,
                        values.len(),
                        buffer.len()
                    ),
                ));
            }
            if worker == 0 {
                buffer.copy_from_slice(&values);
            } else {
                for (acc, v) in buffer.iter_mut().zip(values) {
                    *acc = op.apply(*acc, v);
                }
            }
        }
        Ok(())
    }

    fn broadcast(&self, buffer: &mut Vec<u8>, root: usize) -> Result<()> {
        if root >= self.world_size() {
            return Err(DMatrixError::collective(
                "broadcast",
                format!("root {} out of range for a world of size {}", root, self.world_size()),
            ));
        }
        let gathered = self
            .rendezvous
            .exchange("broadcast", self.rank, buffer.clone())?;
        *buffer = gathered[root].clone();
        Ok(())
    }
}

impl fmt::Debug for InMemoryCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCommunicator")
            .field("rank", &self.rank)
            .field("world_size", &self.rendezvous.world_size)
            .finish()
    }
}

/// Broadcast `payload` from rank 0 and fail if this worker holds something
/// different. A no-op outside a distributed job.
pub fn check_consistent_across_workers(
    comm: &dyn Communicator,
    what: &str,
    payload: &[u8],
) -> Result<()> {
    if !comm.is_distributed() {
        return Ok(());
    }
    let mut synced = payload.to_vec();
    comm.broadcast(&mut synced, 0)?;
    if synced != payload {
        log::error!("Worker {} disagrees with worker 0 on {}", comm.rank(), what);
        return Err(DMatrixError::inconsistent_across_workers(what));
    }
    Ok(())
}

/// Exclusive prefix sum of `local` over worker ranks.
pub fn exclusive_prefix_sum(comm: &dyn Communicator, local: u64) -> Result<u64> {
    let mut buffer = vec![0u64; comm.world_size()];
    buffer[comm.rank()] = local;
    comm.allgather(&mut buffer)?;
    Ok(buffer[..comm.rank()].iter().sum())
}
