use super::Communicator;
use crate::error::Result;

/// Communicator for a job of exactly one rank
///
/// Every collective is the identity. Batch and online execution run through
/// the same merge code as SPMD jobs by using this communicator.
#[derive(Copy, Clone, Debug, Default)]
pub struct SingleRank;

impl Communicator for SingleRank {
    fn rank(&self) -> usize {
        0
    }

    fn rank_count(&self) -> usize {
        1
    }

    fn supports_device_memory(&self) -> bool {
        true
    }

    fn all_gather_bytes(&self, local: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(vec![local.to_vec()])
    }
}
