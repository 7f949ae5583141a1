//! Covariance and correlation matrices

mod partial;

pub use partial::CovariancePartial;

use super::{computed, matrix_table, row_table};
use crate::compute::{Checkable, PartialCompute, PartialResult, ResultOptions, check_chunk};
use crate::error::{Error, Result};
use crate::table::{RowAccessor, Table};

/// Outputs this algorithm can produce
pub const SUPPORTED_OPTIONS: ResultOptions = ResultOptions::COV_MATRIX
    .union(ResultOptions::COR_MATRIX)
    .union(ResultOptions::MEANS);

/// Covariance configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CovarianceDescriptor {
    #[cfg_attr(feature = "serde", serde(with = "crate::algorithm::options_serde"))]
    result_options: ResultOptions,
    bias: bool,
}

impl Default for CovarianceDescriptor {
    fn default() -> Self {
        Self {
            result_options: ResultOptions::COV_MATRIX | ResultOptions::MEANS,
            bias: false,
        }
    }
}

impl CovarianceDescriptor {
    /// Select the outputs to compute
    pub fn with_result_options(mut self, options: ResultOptions) -> Self {
        self.result_options = options;
        self
    }

    /// Divide by `n` instead of `n - 1`
    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Requested outputs
    pub fn result_options(&self) -> ResultOptions {
        self.result_options
    }

    /// Whether the biased estimator is used
    pub fn bias(&self) -> bool {
        self.bias
    }
}

impl Checkable for CovarianceDescriptor {
    fn check(&self) -> Result<()> {
        if self.result_options.is_empty() || !SUPPORTED_OPTIONS.contains(self.result_options) {
            return Err(Error::invalid_argument(
                "result_options",
                format!(
                    "{:?} is not a non-empty subset of {SUPPORTED_OPTIONS:?}",
                    self.result_options
                ),
            ));
        }
        Ok(())
    }
}

/// Covariance result
#[derive(Clone, Debug, Default)]
pub struct CovarianceResult {
    options: ResultOptions,
    cov_matrix: Table,
    cor_matrix: Table,
    means: Table,
}

impl CovarianceResult {
    /// Outputs actually computed
    pub fn options(&self) -> ResultOptions {
        self.options
    }

    /// `p x p` covariance matrix
    pub fn cov_matrix(&self) -> Result<&Table> {
        computed(&self.cov_matrix, "cov_matrix")
    }

    /// `p x p` correlation matrix
    ///
    /// Entries involving a constant column are 0 off the diagonal and 1 on it.
    pub fn cor_matrix(&self) -> Result<&Table> {
        computed(&self.cor_matrix, "cor_matrix")
    }

    /// `1 x p` column means
    pub fn means(&self) -> Result<&Table> {
        computed(&self.means, "means")
    }
}

impl PartialCompute for CovarianceDescriptor {
    type Partial = CovariancePartial;
    type Output = CovarianceResult;

    fn partial_compute(&self, prior: &Self::Partial, data: &Table) -> Result<Self::Partial> {
        let cols = check_chunk(data, prior.column_count())?;
        let block = RowAccessor::<f64>::new(data).pull_all()?;
        Ok(prior.accumulate(block.as_slice()?, cols))
    }

    fn finalize_compute(&self, partial: &Self::Partial) -> Result<Self::Output> {
        self.check()?;
        if partial.is_empty() {
            return Err(Error::computation("covariance of zero observations"));
        }
        if !self.bias && partial.nobs < 2 {
            return Err(Error::computation(
                "unbiased covariance needs at least two observations",
            ));
        }

        let p = partial.sums.len();
        let n = partial.nobs as f64;
        let divisor = if self.bias { n } else { n - 1.0 };
        let means: Vec<f64> = partial.sums.iter().map(|s| s / n).collect();

        let mut cov = vec![0.0; p * p];
        for i in 0..p {
            for j in 0..p {
                let centered = partial.crossproduct[i * p + j] - partial.sums[i] * means[j];
                cov[i * p + j] = centered / divisor;
            }
        }

        let opts = self.result_options;
        let cor_matrix = if opts.contains(ResultOptions::COR_MATRIX) {
            let mut cor = vec![0.0; p * p];
            for i in 0..p {
                for j in 0..p {
                    let scale = (cov[i * p + i] * cov[j * p + j]).sqrt();
                    cor[i * p + j] = if i == j {
                        1.0
                    } else if scale > 0.0 {
                        cov[i * p + j] / scale
                    } else {
                        0.0
                    };
                }
            }
            matrix_table(cor, p, p)?
        } else {
            Table::Empty
        };

        Ok(CovarianceResult {
            options: opts,
            cov_matrix: if opts.contains(ResultOptions::COV_MATRIX) {
                matrix_table(cov, p, p)?
            } else {
                Table::Empty
            },
            cor_matrix,
            means: if opts.contains(ResultOptions::MEANS) {
                row_table(means)?
            } else {
                Table::Empty
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute;
    use crate::error::ErrorKind;
    use crate::table::{CsrIndexing, CsrTable};

    fn data() -> Table {
        // x = 1,2,3,4   y = 2,4,6,8   z = 1,0,1,0
        Table::from_rows(
            vec![1.0f64, 2.0, 1.0, 2.0, 4.0, 0.0, 3.0, 6.0, 1.0, 4.0, 8.0, 0.0],
            4,
            3,
        )
        .unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_covariance_and_means() {
        let result = compute::compute(&CovarianceDescriptor::default(), &data()).unwrap();
        let cov = result.cov_matrix().unwrap().to_row_major_f64().unwrap();
        let third = 1.0 / 3.0;
        assert_close(
            &cov,
            &[
                5.0 / 3.0,
                10.0 / 3.0,
                -third,
                10.0 / 3.0,
                20.0 / 3.0,
                -2.0 * third,
                -third,
                -2.0 * third,
                third,
            ],
        );
        assert_close(
            &result.means().unwrap().to_row_major_f64().unwrap(),
            &[2.5, 5.0, 0.5],
        );
        assert!(result.cor_matrix().is_err());
    }

    #[test]
    fn test_correlation() {
        let desc = CovarianceDescriptor::default().with_result_options(ResultOptions::COR_MATRIX);
        let result = compute::compute(&desc, &data()).unwrap();
        let cor = result.cor_matrix().unwrap().to_row_major_f64().unwrap();
        assert!((cor[1] - 1.0).abs() < 1e-12);
        assert!((cor[0] - 1.0).abs() < 1e-12);
        assert!((cor[2] + 1.0 / 5.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_biased_estimator() {
        let desc = CovarianceDescriptor::default().with_bias(true);
        let result = compute::compute(&desc, &data()).unwrap();
        let cov = result.cov_matrix().unwrap().to_row_major_f64().unwrap();
        assert!((cov[0] - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_sparse_matches_dense() {
        // [1 0] [0 2] [3 0]
        let sparse = Table::from(
            CsrTable::from_vecs(
                vec![1.0f64, 2.0, 3.0],
                vec![0, 1, 0],
                vec![0, 1, 2, 3],
                3,
                2,
                CsrIndexing::ZeroBased,
            )
            .unwrap(),
        );
        let dense = Table::from_rows(vec![1.0f64, 0.0, 0.0, 2.0, 3.0, 0.0], 3, 2).unwrap();
        let desc = CovarianceDescriptor::default();
        let a = compute::compute(&desc, &sparse).unwrap();
        let b = compute::compute(&desc, &dense).unwrap();
        assert_eq!(
            a.cov_matrix().unwrap().to_row_major_f64().unwrap(),
            b.cov_matrix().unwrap().to_row_major_f64().unwrap()
        );
    }

    #[test]
    fn test_single_observation_unbiased_fails() {
        let one = Table::from_rows(vec![1.0f64, 2.0], 1, 2).unwrap();
        let err = compute::compute(&CovarianceDescriptor::default(), &one).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ComputationError);
    }
}
