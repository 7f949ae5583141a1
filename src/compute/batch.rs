use super::{PartialCompute, PartialTrain};
use crate::error::Result;
use crate::table::Table;

/// Single-shot computation: one partial step from empty, then finalize
pub fn compute<D: PartialCompute>(descriptor: &D, data: &Table) -> Result<D::Output> {
    descriptor.check()?;
    let partial = descriptor.partial_compute(&D::Partial::default(), data)?;
    descriptor.finalize_compute(&partial)
}

/// Single-shot training: one partial step from empty, then finalize
pub fn train<D: PartialTrain>(descriptor: &D, data: &Table, responses: &Table) -> Result<D::Model> {
    descriptor.check()?;
    let partial = descriptor.partial_train(&D::Partial::default(), data, responses)?;
    descriptor.finalize_train(&partial)
}
