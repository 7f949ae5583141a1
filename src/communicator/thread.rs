//! In-process communicator: one rank per thread

use super::Communicator;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

struct ExchangeState {
    /// Completed exchanges so far
    generation: u64,
    arrived: usize,
    slots: Vec<Option<Vec<u8>>>,
    /// Blocks of the most recently completed exchange
    gathered: Option<Arc<Vec<Vec<u8>>>>,
}

struct Exchange {
    ranks: usize,
    state: Mutex<ExchangeState>,
    cond: Condvar,
}

/// Communicator connecting ranks that run as threads of one process
///
/// Every collective is a rendezvous: each rank deposits its block, the last
/// one to arrive publishes the gathered blocks and wakes the others.
#[derive(Clone)]
pub struct ThreadCommunicator {
    rank: usize,
    exchange: Arc<Exchange>,
}

impl ThreadCommunicator {
    /// Create connected communicators for `ranks` ranks, indexed by rank
    pub fn group(ranks: usize) -> Result<Vec<Self>> {
        if ranks == 0 {
            return Err(Error::invalid_argument("ranks", "a job needs at least one rank"));
        }
        let exchange = Arc::new(Exchange {
            ranks,
            state: Mutex::new(ExchangeState {
                generation: 0,
                arrived: 0,
                slots: vec![None; ranks],
                gathered: None,
            }),
            cond: Condvar::new(),
        });
        Ok((0..ranks)
            .map(|rank| Self {
                rank,
                exchange: Arc::clone(&exchange),
            })
            .collect())
    }

    /// Run `job` on `ranks` scoped threads, one per rank
    ///
    /// Results are returned in rank order. Every rank must make the same
    /// sequence of collective calls: a rank that returns an error or panics
    /// before a collective leaves the others blocked in it, and `run` never
    /// returns. Once all ranks are past their collectives, the first error in
    /// rank order is reported, and a panic is reported as a communication
    /// error.
    pub fn run<F, R>(ranks: usize, job: F) -> Result<Vec<R>>
    where
        F: Fn(&ThreadCommunicator) -> Result<R> + Sync,
        R: Send,
    {
        let comms = Self::group(ranks)?;
        tracing::debug!(ranks, "starting spmd job");

        let outcomes: Vec<Result<R>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    let job = &job;
                    s.spawn(move || job(comm))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::Communication(format!("rank {rank} panicked"))))
                })
                .collect()
        });
        outcomes.into_iter().collect()
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn rank_count(&self) -> usize {
        self.exchange.ranks
    }

    fn all_gather_bytes(&self, local: &[u8]) -> Result<Vec<Vec<u8>>> {
        let exchange = &*self.exchange;
        let mut state = exchange.state.lock();
        let generation = state.generation;

        if state.slots[self.rank].is_some() {
            return Err(Error::Communication(format!(
                "rank {} entered exchange {generation} twice",
                self.rank
            )));
        }
        state.slots[self.rank] = Some(local.to_vec());
        state.arrived += 1;
        tracing::trace!(rank = self.rank, generation, bytes = local.len(), "exchange arrive");

        if state.arrived == exchange.ranks {
            let blocks: Vec<Vec<u8>> = state
                .slots
                .iter_mut()
                .map(|slot| slot.take().unwrap_or_default())
                .collect();
            state.gathered = Some(Arc::new(blocks));
            state.arrived = 0;
            state.generation += 1;
            exchange.cond.notify_all();
        } else {
            while state.generation == generation {
                exchange.cond.wait(&mut state);
            }
        }

        // The next exchange cannot complete before this rank joins it, so
        // `gathered` still holds this generation's blocks.
        state
            .gathered
            .as_ref()
            .map(|blocks| blocks.as_ref().clone())
            .ok_or_else(|| Error::Internal("exchange completed without blocks".into()))
    }
}

impl std::fmt::Debug for ThreadCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadCommunicator")
            .field("rank", &self.rank)
            .field("ranks", &self.exchange.ranks)
            .finish()
    }
}
