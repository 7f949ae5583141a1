//! Algorithms built on the partial-computation protocol
//!
//! Each algorithm is a descriptor implementing [`PartialCompute`] or
//! [`PartialTrain`], a partial result holding its sufficient statistics,
//! and a result type whose fields are [`Table`]s. Any of them runs in batch
//! mode ([`compute::compute`]), streaming mode ([`compute::Online`]) or SPMD
//! mode ([`compute::spmd`]) without changes.
//!
//! | Algorithm | Accumulator | Merge level |
//! |-----------|-------------|-------------|
//! | [`basic_statistics`] | count, min, max, sums, sums of squares | partial |
//! | [`covariance`] | count, sums, cross product | partial |
//! | [`linear_regression`] | `XᵀX`, `Xᵀy` | partial (training), rows (inference) |
//!
//! [`PartialCompute`]: crate::compute::PartialCompute
//! [`PartialTrain`]: crate::compute::PartialTrain
//! [`compute::compute`]: crate::compute::compute
//! [`compute::Online`]: crate::compute::Online
//! [`compute::spmd`]: crate::compute::spmd

pub mod basic_statistics;
mod cholesky;
pub mod covariance;
pub mod linear_regression;

use crate::array::Array;
use crate::compute::not_computed;
use crate::error::Result;
use crate::table::{HomogenTable, Table};

/// Single-row f64 table
pub(crate) fn row_table(values: Vec<f64>) -> Result<Table> {
    Table::row(Array::from_vec(values))
}

/// Row-major `rows x cols` f64 table
pub(crate) fn matrix_table(values: Vec<f64>, rows: usize, cols: usize) -> Result<Table> {
    HomogenTable::from_vec(values, rows, cols).map(Table::Homogen)
}

/// The table if it was computed, otherwise an error naming the output
pub(crate) fn computed<'a>(table: &'a Table, output: &'static str) -> Result<&'a Table> {
    if table.has_data() {
        Ok(table)
    } else {
        Err(not_computed(output))
    }
}

/// `ResultOptions` as its raw bits
#[cfg(feature = "serde")]
pub(crate) mod options_serde {
    use crate::compute::ResultOptions;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(options: &ResultOptions, s: S) -> Result<S::Ok, S::Error> {
        options.bits().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ResultOptions, D::Error> {
        u64::deserialize(d).map(ResultOptions::from_bits_truncate)
    }
}
