//! Per-column summary statistics
//!
//! ```
//! use dalcore::algorithm::basic_statistics::BasicStatisticsDescriptor;
//! use dalcore::compute;
//! use dalcore::table::Table;
//!
//! let data = Table::from_rows(vec![1.0f64, 10.0, 2.0, 20.0, 3.0, 30.0], 3, 2).unwrap();
//! let result = compute::compute(&BasicStatisticsDescriptor::default(), &data).unwrap();
//! assert_eq!(result.mean().unwrap().to_row_major_f64().unwrap(), vec![2.0, 20.0]);
//! ```

mod partial;

pub use partial::BasicStatisticsPartial;

use super::{computed, row_table};
use crate::compute::{Checkable, PartialCompute, PartialResult, ResultOptions, check_chunk};
use crate::error::{Error, Result};
use crate::table::{RowAccessor, Table};

/// Outputs this algorithm can produce
pub const SUPPORTED_OPTIONS: ResultOptions = ResultOptions::MIN
    .union(ResultOptions::MAX)
    .union(ResultOptions::SUM)
    .union(ResultOptions::SUM_SQUARES)
    .union(ResultOptions::MEAN)
    .union(ResultOptions::VARIANCE)
    .union(ResultOptions::STANDARD_DEVIATION);

/// Which statistics to compute
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicStatisticsDescriptor {
    #[cfg_attr(feature = "serde", serde(with = "crate::algorithm::options_serde"))]
    result_options: ResultOptions,
}

impl Default for BasicStatisticsDescriptor {
    fn default() -> Self {
        Self {
            result_options: SUPPORTED_OPTIONS,
        }
    }
}

impl BasicStatisticsDescriptor {
    /// Select the outputs to compute
    pub fn with_result_options(mut self, options: ResultOptions) -> Self {
        self.result_options = options;
        self
    }

    /// Requested outputs
    pub fn result_options(&self) -> ResultOptions {
        self.result_options
    }
}

impl Checkable for BasicStatisticsDescriptor {
    fn check(&self) -> Result<()> {
        if self.result_options.is_empty() {
            return Err(Error::invalid_argument("result_options", "no output requested"));
        }
        if !SUPPORTED_OPTIONS.contains(self.result_options) {
            return Err(Error::invalid_argument(
                "result_options",
                format!(
                    "{:?} not produced by basic statistics",
                    self.result_options.difference(SUPPORTED_OPTIONS)
                ),
            ));
        }
        Ok(())
    }
}

/// Summary statistics, one single-row table per requested output
#[derive(Clone, Debug, Default)]
pub struct BasicStatisticsResult {
    options: ResultOptions,
    observation_count: u64,
    min: Table,
    max: Table,
    sum: Table,
    sum_squares: Table,
    mean: Table,
    variance: Table,
    standard_deviation: Table,
}

impl BasicStatisticsResult {
    /// Outputs actually computed
    pub fn options(&self) -> ResultOptions {
        self.options
    }

    /// Number of rows the statistics cover
    pub fn observation_count(&self) -> u64 {
        self.observation_count
    }

    /// Per-column minimum
    pub fn min(&self) -> Result<&Table> {
        computed(&self.min, "min")
    }

    /// Per-column maximum
    pub fn max(&self) -> Result<&Table> {
        computed(&self.max, "max")
    }

    /// Per-column sum
    pub fn sum(&self) -> Result<&Table> {
        computed(&self.sum, "sum")
    }

    /// Per-column sum of squares
    pub fn sum_squares(&self) -> Result<&Table> {
        computed(&self.sum_squares, "sum_squares")
    }

    /// Per-column mean
    pub fn mean(&self) -> Result<&Table> {
        computed(&self.mean, "mean")
    }

    /// Per-column unbiased variance (0 for a single observation)
    pub fn variance(&self) -> Result<&Table> {
        computed(&self.variance, "variance")
    }

    /// Per-column standard deviation
    pub fn standard_deviation(&self) -> Result<&Table> {
        computed(&self.standard_deviation, "standard_deviation")
    }
}

impl PartialCompute for BasicStatisticsDescriptor {
    type Partial = BasicStatisticsPartial;
    type Output = BasicStatisticsResult;

    fn partial_compute(&self, prior: &Self::Partial, data: &Table) -> Result<Self::Partial> {
        let cols = check_chunk(data, prior.column_count())?;
        let block = RowAccessor::<f64>::new(data).pull_all()?;
        tracing::trace!(rows = data.row_count(), cols, "basic statistics chunk");
        Ok(prior.accumulate(block.as_slice()?, cols))
    }

    fn finalize_compute(&self, partial: &Self::Partial) -> Result<Self::Output> {
        self.check()?;
        if partial.is_empty() {
            return Err(Error::computation("basic statistics of zero observations"));
        }
        let n = partial.nobs as f64;
        let opts = self.result_options;
        let mean: Vec<f64> = partial.sum.iter().map(|s| s / n).collect();
        let variance: Vec<f64> = partial
            .sum
            .iter()
            .zip(&partial.sum_squares)
            .zip(&mean)
            .map(|((s, sq), m)| {
                if partial.nobs > 1 {
                    ((sq - s * m) / (n - 1.0)).max(0.0)
                } else {
                    0.0
                }
            })
            .collect();

        let pick = |flag: ResultOptions, values: &[f64]| -> Result<Table> {
            if opts.contains(flag) {
                row_table(values.to_vec())
            } else {
                Ok(Table::Empty)
            }
        };

        Ok(BasicStatisticsResult {
            options: opts,
            observation_count: partial.nobs,
            min: pick(ResultOptions::MIN, &partial.min)?,
            max: pick(ResultOptions::MAX, &partial.max)?,
            sum: pick(ResultOptions::SUM, &partial.sum)?,
            sum_squares: pick(ResultOptions::SUM_SQUARES, &partial.sum_squares)?,
            mean: pick(ResultOptions::MEAN, &mean)?,
            standard_deviation: pick(
                ResultOptions::STANDARD_DEVIATION,
                &variance.iter().map(|v| v.sqrt()).collect::<Vec<_>>(),
            )?,
            variance: pick(ResultOptions::VARIANCE, &variance)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{self, Online};
    use crate::error::ErrorKind;

    fn data() -> Table {
        Table::from_rows(vec![1.0f64, 4.0, 2.0, 5.0, 3.0, 9.0], 3, 2).unwrap()
    }

    fn row(table: &Table) -> Vec<f64> {
        table.to_row_major_f64().unwrap()
    }

    #[test]
    fn test_batch_statistics() {
        let result = compute::compute(&BasicStatisticsDescriptor::default(), &data()).unwrap();
        assert_eq!(result.observation_count(), 3);
        assert_eq!(row(result.min().unwrap()), vec![1.0, 4.0]);
        assert_eq!(row(result.max().unwrap()), vec![3.0, 9.0]);
        assert_eq!(row(result.sum().unwrap()), vec![6.0, 18.0]);
        assert_eq!(row(result.sum_squares().unwrap()), vec![14.0, 122.0]);
        assert_eq!(row(result.mean().unwrap()), vec![2.0, 6.0]);
        assert_eq!(row(result.variance().unwrap()), vec![1.0, 7.0]);
        let sd = row(result.standard_deviation().unwrap());
        assert!((sd[1] - 7.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_selected_outputs_only() {
        let desc = BasicStatisticsDescriptor::default()
            .with_result_options(ResultOptions::MEAN | ResultOptions::MAX);
        let result = compute::compute(&desc, &data()).unwrap();
        assert!(result.mean().is_ok());
        assert!(result.max().is_ok());
        assert_eq!(result.min().unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(result.options(), ResultOptions::MEAN | ResultOptions::MAX);
    }

    #[test]
    fn test_unsupported_options_rejected() {
        let desc =
            BasicStatisticsDescriptor::default().with_result_options(ResultOptions::COV_MATRIX);
        assert!(desc.check().is_err());
        assert!(
            BasicStatisticsDescriptor::default()
                .with_result_options(ResultOptions::empty())
                .check()
                .is_err()
        );
    }

    #[test]
    fn test_empty_finalize_is_computation_error() {
        let online = Online::new(BasicStatisticsDescriptor::default()).unwrap();
        let err = online.finalize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ComputationError);
    }

    #[test]
    fn test_chunk_column_mismatch() {
        let mut online = Online::new(BasicStatisticsDescriptor::default()).unwrap();
        online.push(&data()).unwrap();
        let wide = Table::from_rows(vec![1.0f64; 3], 1, 3).unwrap();
        assert_eq!(
            online.push(&wide).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(online.partial().observation_count(), 3);
    }

    #[test]
    fn test_single_observation_variance() {
        let one = Table::from_rows(vec![5.0f64, 6.0], 1, 2).unwrap();
        let result = compute::compute(&BasicStatisticsDescriptor::default(), &one).unwrap();
        assert_eq!(row(result.variance().unwrap()), vec![0.0, 0.0]);
    }

    #[test]
    fn test_default_result_holds_nothing() {
        let result = BasicStatisticsResult::default();
        assert!(result.options().is_empty());
        assert_eq!(result.observation_count(), 0);
        assert!(result.mean().is_err());
    }
}
