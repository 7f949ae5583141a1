//! Distributed merge of partial results and results
//!
//! SPMD execution runs in three phases on every rank:
//!
//! 1. local accumulation, no communication
//! 2. one collective exchange inside a merge helper from this module
//! 3. local finalize of the merged accumulator
//!
//! These helpers are the only code that calls a [`Communicator`].

use super::{PartialCompute, PartialResult, PartialTrain};
use crate::communicator::{Collectives, Communicator};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::table::{HomogenTable, Table};

/// Merge every rank's accumulator into one, identical on all ranks
///
/// The packed accumulators are all-gathered and merged locally in rank
/// order, starting from the empty accumulator.
pub fn merge_partial<P, C>(comm: &C, local: &P) -> Result<P>
where
    P: PartialResult,
    C: Communicator + ?Sized,
{
    let packed = local.pack();
    tracing::debug!(
        rank = comm.rank(),
        ranks = comm.rank_count(),
        values = packed.len(),
        "merging partial results"
    );
    let blocks = comm.all_gather(&packed)?;
    blocks.iter().try_fold(P::default(), |acc, block| {
        let partial = P::unpack(block)?;
        acc.merge(&partial)
    })
}

/// Distributed computation over this rank's share of the data
pub fn compute<D, C>(comm: &C, descriptor: &D, local_data: &Table) -> Result<D::Output>
where
    D: PartialCompute,
    C: Communicator + ?Sized,
{
    descriptor.check()?;
    let local = if local_data.has_data() {
        descriptor.partial_compute(&D::Partial::default(), local_data)?
    } else {
        D::Partial::default()
    };
    let merged = merge_partial(comm, &local)?;
    descriptor.finalize_compute(&merged)
}

/// Distributed training over this rank's share of the observations
pub fn train<D, C>(comm: &C, descriptor: &D, local_data: &Table, local_responses: &Table) -> Result<D::Model>
where
    D: PartialTrain,
    C: Communicator + ?Sized,
{
    descriptor.check()?;
    let local = if local_data.has_data() {
        descriptor.partial_train(&D::Partial::default(), local_data, local_responses)?
    } else {
        D::Partial::default()
    };
    let merged = merge_partial(comm, &local)?;
    descriptor.finalize_train(&merged)
}

/// Value of a field that is identical on every rank by construction
///
/// Rank 0's value is returned. Debug builds check that every rank holds
/// the same values.
pub fn replicated<C>(comm: &C, local: &[f64]) -> Result<Vec<f64>>
where
    C: Communicator + ?Sized,
{
    let mut blocks = comm.all_gather(local)?;
    debug_assert!(
        blocks.iter().all(|b| b.len() == blocks[0].len()
            && b.iter().zip(&blocks[0]).all(|(x, y)| x.to_bits() == y.to_bits())),
        "replicated field differs between ranks"
    );
    Ok(std::mem::take(&mut blocks[0]))
}

/// Reassemble a row-partitioned table in rank order
///
/// Each rank contributes its rows (or an empty table for none); the result
/// is a dense f64 table holding all rows, rank 0's first, each rank's rows
/// in their local order. Returns [`Table::Empty`] if no rank has rows.
pub fn concat_rows<C>(comm: &C, local: &Table) -> Result<Table>
where
    C: Communicator + ?Sized,
{
    let values = if local.has_data() {
        local.to_row_major_f64()?
    } else {
        Vec::new()
    };
    let shapes = comm.all_gather(&[local.row_count() as i64, local.column_count() as i64])?;
    let blocks = comm.all_gather(&values)?;

    let mut column_count = None;
    let mut row_count = 0usize;
    for (rank, shape) in shapes.iter().enumerate() {
        let (rows, cols) = (shape[0] as usize, shape[1] as usize);
        if rows == 0 {
            continue;
        }
        match column_count {
            Some(expected) if expected != cols => {
                return Err(Error::invalid_argument(
                    "local",
                    format!("rank {rank} has {cols} columns, earlier ranks have {expected}"),
                ));
            }
            _ => column_count = Some(cols),
        }
        row_count += rows;
    }
    let Some(column_count) = column_count else {
        return Ok(Table::Empty);
    };

    let data: Vec<f64> = blocks.into_iter().flatten().collect();
    tracing::debug!(rank = comm.rank(), row_count, column_count, "concatenated rows");
    let table = HomogenTable::from_vec(data, row_count, column_count)?;
    debug_assert_eq!(table.dtype(), DType::F64);
    Ok(Table::Homogen(table))
}
