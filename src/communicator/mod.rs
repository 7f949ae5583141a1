//! Collective communication between ranks
//!
//! A [`Communicator`] connects the ranks of one SPMD job. Implementations
//! supply a single primitive, an all-gather of byte blocks; every typed
//! collective in [`Collectives`] is built on top of it and reduces locally
//! in rank order, so all ranks compute bit-identical results.
//!
//! Collectives block until every rank has made the matching call. A rank
//! that never participates deadlocks the others; nothing here detects it.
//!
//! ```
//! use dalcore::communicator::{Collectives, Communicator, ReduceOp, ThreadCommunicator};
//!
//! let sums = ThreadCommunicator::run(3, |comm| {
//!     let mut value = [comm.rank() as f64 + 1.0];
//!     comm.all_reduce(&mut value, ReduceOp::Sum)?.wait()?;
//!     Ok(value[0])
//! })
//! .unwrap();
//! assert_eq!(sums, vec![6.0, 6.0, 6.0]);
//! ```

mod single;
mod thread;

pub use single::SingleRank;
pub use thread::ThreadCommunicator;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Event;

/// Reduction applied by [`Collectives::all_reduce`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise sum
    Sum,
    /// Element-wise minimum
    Min,
    /// Element-wise maximum
    Max,
}

impl ReduceOp {
    fn apply<T: Element>(self, acc: T, value: T) -> T {
        match self {
            Self::Sum => acc + value,
            Self::Min => {
                if value < acc {
                    value
                } else {
                    acc
                }
            }
            Self::Max => {
                if value > acc {
                    value
                } else {
                    acc
                }
            }
        }
    }
}

/// Rank identity plus the all-gather primitive
pub trait Communicator: Send + Sync {
    /// Index of this rank in `0..rank_count()`
    fn rank(&self) -> usize;

    /// Number of ranks in the job
    fn rank_count(&self) -> usize;

    /// Whether buffers in accelerator memory may be passed directly
    fn supports_device_memory(&self) -> bool {
        false
    }

    /// Exchange one byte block per rank
    ///
    /// Returns every rank's block, indexed by rank.
    fn all_gather_bytes(&self, local: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Block until every rank reaches the barrier
    fn barrier(&self) -> Result<()> {
        self.all_gather_bytes(&[]).map(drop)
    }

    /// Check whether this is rank 0
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Typed collectives available on every communicator
///
/// Each call returns an [`Event`]. The substrate is synchronous, so the
/// event has already completed, but callers should still wait on it.
pub trait Collectives: Communicator {
    /// Reduce `values` element-wise across ranks, in place on every rank
    fn all_reduce<T: Element>(&self, values: &mut [T], op: ReduceOp) -> Result<Event> {
        tracing::trace!(rank = self.rank(), ?op, len = values.len(), "all_reduce");
        let blocks = self.all_gather(values)?;
        for (rank, block) in blocks.iter().enumerate() {
            if block.len() != values.len() {
                return Err(Error::Communication(format!(
                    "rank {rank} reduced {} elements, expected {}",
                    block.len(),
                    values.len()
                )));
            }
        }
        for (i, value) in values.iter_mut().enumerate() {
            *value = blocks[1..]
                .iter()
                .fold(blocks[0][i], |acc, block| op.apply(acc, block[i]));
        }
        Ok(Event::completed())
    }

    /// Gather a variable-length block from every rank into `recv`
    ///
    /// Rank `r` contributes `counts[r]` elements, written at
    /// `recv[displs[r]..displs[r] + counts[r]]` on every rank.
    fn all_gather_variable<T: Element>(
        &self,
        local: &[T],
        recv: &mut [T],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<Event> {
        let ranks = self.rank_count();
        if counts.len() != ranks || displs.len() != ranks {
            return Err(Error::invalid_argument(
                "counts",
                format!(
                    "{} counts and {} displacements for {ranks} ranks",
                    counts.len(),
                    displs.len()
                ),
            ));
        }
        if local.len() != counts[self.rank()] {
            return Err(Error::shape_mismatch(&[counts[self.rank()]], &[local.len()]));
        }
        let ends = (0..ranks)
            .map(|r| match displs[r].checked_add(counts[r]) {
                Some(end) if end <= recv.len() => Ok(end),
                Some(end) => Err(Error::invalid_argument(
                    "displs",
                    format!(
                        "block of rank {r} ends at {end}, receive buffer holds {}",
                        recv.len()
                    ),
                )),
                None => Err(Error::invalid_argument(
                    "displs",
                    format!("block of rank {r} overflows the address space"),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        let blocks = self.all_gather(local)?;
        for (r, block) in blocks.iter().enumerate() {
            if block.len() != counts[r] {
                return Err(Error::Communication(format!(
                    "rank {r} sent {} elements, expected {}",
                    block.len(),
                    counts[r]
                )));
            }
            recv[displs[r]..ends[r]].copy_from_slice(block);
        }
        Ok(Event::completed())
    }

    /// Overwrite `values` on every rank with the values held by `root`
    fn broadcast<T: Element>(&self, values: &mut [T], root: usize) -> Result<Event> {
        if root >= self.rank_count() {
            return Err(Error::invalid_argument(
                "root",
                format!("rank {root} of {}", self.rank_count()),
            ));
        }
        let local: &[T] = if self.rank() == root { &*values } else { &[] };
        let mut blocks = self.all_gather(local)?;
        let block = std::mem::take(&mut blocks[root]);
        if block.len() != values.len() {
            return Err(Error::Communication(format!(
                "root broadcast {} elements, expected {}",
                block.len(),
                values.len()
            )));
        }
        values.copy_from_slice(&block);
        Ok(Event::completed())
    }

    /// Every rank's block of `T`, indexed by rank
    fn all_gather<T: Element>(&self, local: &[T]) -> Result<Vec<Vec<T>>> {
        let bytes = self.all_gather_bytes(bytemuck::cast_slice(local))?;
        if bytes.len() != self.rank_count() {
            return Err(Error::Communication(format!(
                "gathered {} blocks from {} ranks",
                bytes.len(),
                self.rank_count()
            )));
        }
        bytes
            .iter()
            .map(|block| {
                if block.len() % std::mem::size_of::<T>() != 0 {
                    return Err(Error::Communication(format!(
                        "{} bytes is not a whole number of {} elements",
                        block.len(),
                        T::DTYPE
                    )));
                }
                Ok(bytemuck::pod_collect_to_vec::<u8, T>(block))
            })
            .collect()
    }
}

impl<C: Communicator + ?Sized> Collectives for C {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_ops() {
        assert_eq!(ReduceOp::Sum.apply(2i32, 3), 5);
        assert_eq!(ReduceOp::Min.apply(2.0f64, -1.0), -1.0);
        assert_eq!(ReduceOp::Max.apply(7u8, 3), 7);
    }

    #[test]
    fn test_all_reduce_across_threads() {
        let out = ThreadCommunicator::run(4, |comm| {
            let r = comm.rank() as i64;
            let mut values = [r, -r, r * r];
            comm.all_reduce(&mut values, ReduceOp::Sum)?.wait()?;
            let mut lo = [r];
            comm.all_reduce(&mut lo, ReduceOp::Min)?.wait()?;
            let mut hi = [r];
            comm.all_reduce(&mut hi, ReduceOp::Max)?.wait()?;
            Ok((values, lo[0], hi[0]))
        })
        .unwrap();
        for (values, lo, hi) in out {
            assert_eq!(values, [6, -6, 14]);
            assert_eq!((lo, hi), (0, 3));
        }
    }

    #[test]
    fn test_all_gather_variable() {
        let out = ThreadCommunicator::run(3, |comm| {
            let counts = [1, 2, 3];
            let displs = [0, 1, 3];
            let local: Vec<f32> = vec![comm.rank() as f32; counts[comm.rank()]];
            let mut recv = vec![0.0f32; 6];
            comm.all_gather_variable(&local, &mut recv, &counts, &displs)?
                .wait()?;
            Ok(recv)
        })
        .unwrap();
        for recv in out {
            assert_eq!(recv, vec![0.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        }
    }

    #[test]
    fn test_all_gather_variable_validates_counts() {
        let comm = SingleRank;
        let mut recv = [0u8; 2];
        assert!(comm.all_gather_variable(&[1u8, 2], &mut recv, &[1], &[0]).is_err());
        assert!(comm.all_gather_variable(&[1u8, 2], &mut recv, &[2], &[1]).is_err());
        assert!(comm.all_gather_variable(&[1u8, 2], &mut recv, &[2], &[0]).is_ok());
    }

    #[test]
    fn test_all_gather_variable_rejects_overflowing_displacement() {
        let mut recv = [0u8; 4];
        let err = SingleRank
            .all_gather_variable(&[1u8, 2], &mut recv, &[2], &[usize::MAX])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "displs", .. }));
        assert_eq!(recv, [0; 4]);
    }

    #[test]
    fn test_broadcast_from_root() {
        let out = ThreadCommunicator::run(3, |comm| {
            let mut values = if comm.rank() == 2 { [9i32, 8] } else { [0, 0] };
            comm.broadcast(&mut values, 2)?.wait()?;
            Ok(values)
        })
        .unwrap();
        assert!(out.iter().all(|v| *v == [9, 8]));
        assert!(SingleRank.broadcast(&mut [1u8], 1).is_err());
    }
}
