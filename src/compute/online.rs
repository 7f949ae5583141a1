//! Streaming drivers

use super::{PartialCompute, PartialResult, PartialTrain};
use crate::error::Result;
use crate::table::Table;

/// Whether a streaming accumulator has seen data
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OnlineState {
    /// No chunk accumulated yet
    Empty,
    /// At least one chunk accumulated
    Accumulated,
}

/// Feeds chunks of one stream into a [`PartialCompute`] accumulator
///
/// Calls on one instance must be serialized; `&mut self` enforces that.
#[derive(Debug)]
pub struct Online<D: PartialCompute> {
    descriptor: D,
    partial: D::Partial,
}

impl<D: PartialCompute> Online<D> {
    /// Start an empty stream, validating the descriptor
    pub fn new(descriptor: D) -> Result<Self> {
        descriptor.check()?;
        Ok(Self {
            descriptor,
            partial: D::Partial::default(),
        })
    }

    /// Accumulate one more chunk
    ///
    /// On error the accumulator is left as it was before the call.
    pub fn push(&mut self, chunk: &Table) -> Result<()> {
        self.partial = self.descriptor.partial_compute(&self.partial, chunk)?;
        Ok(())
    }

    /// Current state
    pub fn state(&self) -> OnlineState {
        if self.partial.is_empty() {
            OnlineState::Empty
        } else {
            OnlineState::Accumulated
        }
    }

    /// Result for every chunk pushed so far
    ///
    /// More chunks may be pushed afterwards.
    pub fn finalize(&self) -> Result<D::Output> {
        self.descriptor.finalize_compute(&self.partial)
    }

    /// The accumulator
    pub fn partial(&self) -> &D::Partial {
        &self.partial
    }

    /// The descriptor
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    /// Drop everything accumulated
    pub fn reset(&mut self) {
        self.partial = D::Partial::default();
    }

    /// Consume the driver, returning the accumulator
    pub fn into_partial(self) -> D::Partial {
        self.partial
    }
}

/// Feeds chunks of one stream into a [`PartialTrain`] accumulator
#[derive(Debug)]
pub struct OnlineTrain<D: PartialTrain> {
    descriptor: D,
    partial: D::Partial,
}

impl<D: PartialTrain> OnlineTrain<D> {
    /// Start an empty stream, validating the descriptor
    pub fn new(descriptor: D) -> Result<Self> {
        descriptor.check()?;
        Ok(Self {
            descriptor,
            partial: D::Partial::default(),
        })
    }

    /// Accumulate one more chunk of observations and responses
    pub fn push(&mut self, data: &Table, responses: &Table) -> Result<()> {
        self.partial = self.descriptor.partial_train(&self.partial, data, responses)?;
        Ok(())
    }

    /// Current state
    pub fn state(&self) -> OnlineState {
        if self.partial.is_empty() {
            OnlineState::Empty
        } else {
            OnlineState::Accumulated
        }
    }

    /// Model for every chunk pushed so far
    pub fn finalize(&self) -> Result<D::Model> {
        self.descriptor.finalize_train(&self.partial)
    }

    /// The accumulator
    pub fn partial(&self) -> &D::Partial {
        &self.partial
    }

    /// Consume the driver, returning the accumulator
    pub fn into_partial(self) -> D::Partial {
        self.partial
    }
}
