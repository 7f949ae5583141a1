//! Partial-computation protocol shared by every algorithm
//!
//! An algorithm plugs into batch, online and SPMD execution by implementing
//! [`PartialCompute`] (or [`PartialTrain`]) on its descriptor:
//!
//! ```text
//! Empty ──partial_compute(chunk)──▶ Accumulated ──finalize──▶ Result
//!                                   │    ▲
//!                                   └────┘ partial_compute(chunk)
//! ```
//!
//! - `partial_compute` is pure: it returns a new partial result and never
//!   mutates the prior one.
//! - `finalize` is idempotent: the same partial result always yields a
//!   bit-identical result.
//! - [`PartialResult::merge`] is associative and commutative, so any
//!   grouping of chunks into ranks finalizes to the same answer.
//!
//! Finalizing an empty partial result fails with a computation error.

mod batch;
mod flat;
mod online;
pub mod spmd;

pub use batch::{compute, train};
pub use flat::{FlatReader, FlatWriter};
pub use online::{Online, OnlineState, OnlineTrain};

use crate::error::{Error, Result};
use crate::table::Table;

/// Validation run on descriptors before any computation
pub trait Checkable {
    /// Check the configuration, failing with `InvalidArgument`
    fn check(&self) -> Result<()>;
}

/// Accumulated sufficient statistics of one algorithm
///
/// `Default` is the empty accumulator.
pub trait PartialResult: Clone + Default + Send + Sync + std::fmt::Debug {
    /// Check whether no data has been accumulated
    fn is_empty(&self) -> bool;

    /// Combine two accumulators
    ///
    /// Must be associative and commutative, and the empty accumulator must
    /// be its identity. Fails with `InvalidArgument` if the accumulators
    /// describe data of different shapes.
    fn merge(&self, other: &Self) -> Result<Self>;

    /// Flat encoding for exchange between ranks
    fn pack(&self) -> Vec<f64>;

    /// Decode a value produced by [`PartialResult::pack`]
    fn unpack(flat: &[f64]) -> Result<Self>;
}

/// Algorithms computed from one table
pub trait PartialCompute: Checkable {
    /// Accumulator type
    type Partial: PartialResult;
    /// Public result type
    type Output;

    /// Fold one more chunk into `prior`
    fn partial_compute(&self, prior: &Self::Partial, data: &Table) -> Result<Self::Partial>;

    /// Produce the result for everything accumulated so far
    fn finalize_compute(&self, partial: &Self::Partial) -> Result<Self::Output>;
}

/// Algorithms trained from a data table and a responses table
pub trait PartialTrain: Checkable {
    /// Accumulator type
    type Partial: PartialResult;
    /// Trained model type
    type Model;

    /// Fold one more chunk of observations into `prior`
    fn partial_train(
        &self,
        prior: &Self::Partial,
        data: &Table,
        responses: &Table,
    ) -> Result<Self::Partial>;

    /// Produce the model for everything accumulated so far
    fn finalize_train(&self, partial: &Self::Partial) -> Result<Self::Model>;
}

bitflags::bitflags! {
    /// Which optional outputs a result holds
    ///
    /// Descriptors carry the requested set; results record the set that was
    /// actually computed.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ResultOptions: u64 {
        /// Per-column minimum
        const MIN = 1 << 0;
        /// Per-column maximum
        const MAX = 1 << 1;
        /// Per-column sum
        const SUM = 1 << 2;
        /// Per-column sum of squares
        const SUM_SQUARES = 1 << 3;
        /// Per-column mean
        const MEAN = 1 << 4;
        /// Per-column variance
        const VARIANCE = 1 << 5;
        /// Per-column standard deviation
        const STANDARD_DEVIATION = 1 << 6;
        /// Covariance matrix
        const COV_MATRIX = 1 << 8;
        /// Correlation matrix
        const COR_MATRIX = 1 << 9;
        /// Column means of a covariance computation
        const MEANS = 1 << 10;
        /// Regression coefficients
        const COEFFICIENTS = 1 << 12;
        /// Regression intercept
        const INTERCEPT = 1 << 13;
    }
}

/// Column count of a chunk fed into an accumulator
///
/// The chunk must hold data, and if the accumulator already saw data its
/// column count must match.
pub(crate) fn check_chunk(data: &Table, accumulated_columns: Option<usize>) -> Result<usize> {
    if !data.has_data() {
        return Err(Error::invalid_argument("data", "chunk table has no data"));
    }
    let columns = data.column_count();
    match accumulated_columns {
        Some(expected) if expected != columns => Err(Error::invalid_argument(
            "data",
            format!("chunk has {columns} columns, accumulator has {expected}"),
        )),
        _ => Ok(columns),
    }
}

/// Error for reading an output the descriptor did not request
pub(crate) fn not_computed(output: &'static str) -> Error {
    Error::invalid_argument(output, "output was not requested by the descriptor")
}
