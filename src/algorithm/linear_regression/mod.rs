//! Least-squares linear regression via the normal equations
//!
//! Training accumulates `XᵀX` and `Xᵀy` and merges them at the accumulator
//! level. Inference is row-parallel: in SPMD mode each rank predicts its own
//! rows and [`infer_distributed`] concatenates the predictions in rank
//! order.

mod model;
mod partial;

pub use model::LinearRegressionModel;
pub use partial::LinearRegressionPartial;

use super::cholesky;
use crate::communicator::Communicator;
use crate::compute::{Checkable, PartialResult, PartialTrain, check_chunk, spmd};
use crate::error::{Error, Result};
use crate::table::{RowAccessor, Table};

/// Training configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearRegressionDescriptor {
    compute_intercept: bool,
    alpha: f64,
}

impl Default for LinearRegressionDescriptor {
    fn default() -> Self {
        Self {
            compute_intercept: true,
            alpha: 0.0,
        }
    }
}

impl LinearRegressionDescriptor {
    /// Fit an intercept term
    pub fn with_intercept(mut self, compute_intercept: bool) -> Self {
        self.compute_intercept = compute_intercept;
        self
    }

    /// Ridge penalty added to the diagonal of `XᵀX` (not the intercept)
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Whether an intercept is fitted
    pub fn compute_intercept(&self) -> bool {
        self.compute_intercept
    }

    /// Ridge penalty
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Checkable for LinearRegressionDescriptor {
    fn check(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(Error::invalid_argument(
                "alpha",
                format!("{} is not a finite, non-negative penalty", self.alpha),
            ));
        }
        Ok(())
    }
}

impl PartialTrain for LinearRegressionDescriptor {
    type Partial = LinearRegressionPartial;
    type Model = LinearRegressionModel;

    fn partial_train(
        &self,
        prior: &Self::Partial,
        data: &Table,
        responses: &Table,
    ) -> Result<Self::Partial> {
        let p = check_chunk(data, prior.feature_count())?;
        let r = check_chunk(responses, prior.response_count())?;
        if data.row_count() != responses.row_count() {
            return Err(Error::invalid_argument(
                "responses",
                format!(
                    "{} responses for {} observations",
                    responses.row_count(),
                    data.row_count()
                ),
            ));
        }
        let x = RowAccessor::<f64>::new(data).pull_all()?;
        let y = RowAccessor::<f64>::new(responses).pull_all()?;
        Ok(prior.accumulate(x.as_slice()?, p, y.as_slice()?, r))
    }

    fn finalize_train(&self, partial: &Self::Partial) -> Result<Self::Model> {
        self.check()?;
        if partial.is_empty() {
            return Err(Error::computation("regression on zero observations"));
        }

        let (p, r) = (partial.features, partial.responses);
        let full = p + 1;
        // index of the first unknown in the augmented system
        let first = usize::from(!self.compute_intercept);
        let q = full - first;

        let mut system = vec![0.0; q * q];
        for i in 0..q {
            for j in 0..q {
                system[i * q + j] = partial.xtx[(i + first) * full + (j + first)];
            }
            if i + first > 0 {
                system[i * q + i] += self.alpha;
            }
        }
        let factor = cholesky::decompose(&system, q).map_err(|err| {
            tracing::warn!(features = p, nobs = partial.nobs, "normal equations are singular");
            err
        })?;

        // r x (p + 1), intercept in column 0
        let mut betas = vec![0.0; r * full];
        let mut rhs = vec![0.0; q];
        for t in 0..r {
            for (i, b) in rhs.iter_mut().enumerate() {
                *b = partial.xty[(i + first) * r + t];
            }
            cholesky::solve_in_place(&factor, q, &mut rhs);
            betas[t * full + first..(t + 1) * full].copy_from_slice(&rhs);
        }

        LinearRegressionModel::new(betas, p, r, self.compute_intercept)
    }
}

/// Predict this rank's rows, then gather every rank's predictions in rank
/// order
///
/// Ranks without rows pass [`Table::Empty`].
pub fn infer_distributed<C>(comm: &C, model: &LinearRegressionModel, local: &Table) -> Result<Table>
where
    C: Communicator + ?Sized,
{
    let predictions = if local.has_data() {
        model.infer(local)?
    } else {
        Table::Empty
    };
    spmd::concat_rows(comm, &predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{self, OnlineTrain};
    use crate::error::ErrorKind;

    fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < tol, "{actual:?} != {expected:?}");
        }
    }

    // y = 1 + 2 a - b   and   z = 3 b
    fn training_set() -> (Table, Table) {
        let x = vec![0.0f64, 0.0, 1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 1.0];
        let mut y = Vec::new();
        for row in x.chunks(2) {
            y.push(1.0 + 2.0 * row[0] - row[1]);
            y.push(3.0 * row[1]);
        }
        (
            Table::from_rows(x, 5, 2).unwrap(),
            Table::from_rows(y, 5, 2).unwrap(),
        )
    }

    #[test]
    fn test_exact_fit() {
        let (x, y) = training_set();
        let model = compute::train(&LinearRegressionDescriptor::default(), &x, &y).unwrap();

        assert_close(
            &model.coefficients().to_row_major_f64().unwrap(),
            &[2.0, -1.0, 0.0, 3.0],
            1e-9,
        );
        assert_close(
            &model.intercept().unwrap().to_row_major_f64().unwrap(),
            &[1.0, 0.0],
            1e-9,
        );

        let predicted = model.infer(&x).unwrap().to_row_major_f64().unwrap();
        assert_close(&predicted, &y.to_row_major_f64().unwrap(), 1e-9);
    }

    #[test]
    fn test_without_intercept() {
        let x = Table::column(vec![1.0f64, 2.0, 3.0]).unwrap();
        let y = Table::column(vec![2.0f64, 4.0, 6.0]).unwrap();
        let desc = LinearRegressionDescriptor::default().with_intercept(false);
        let model = compute::train(&desc, &x, &y).unwrap();
        assert_close(&model.coefficients().to_row_major_f64().unwrap(), &[2.0], 1e-12);
        assert!(model.intercept().is_err());
    }

    #[test]
    fn test_ridge_shrinks() {
        let x = Table::column(vec![1.0f64, 2.0, 3.0]).unwrap();
        let y = Table::column(vec![2.0f64, 4.0, 6.0]).unwrap();
        let desc = LinearRegressionDescriptor::default()
            .with_intercept(false)
            .with_alpha(14.0);
        let model = compute::train(&desc, &x, &y).unwrap();
        // 28 / (14 + 14)
        assert_close(&model.coefficients().to_row_major_f64().unwrap(), &[1.0], 1e-12);
    }

    #[test]
    fn test_streaming_matches_batch() {
        let (x, y) = training_set();
        let desc = LinearRegressionDescriptor::default();
        let batch = compute::train(&desc, &x, &y).unwrap();

        let mut online = OnlineTrain::new(desc).unwrap();
        for range in [0..2, 2..3, 3..5] {
            online
                .push(&x.row_slice(range.clone()).unwrap(), &y.row_slice(range).unwrap())
                .unwrap();
        }
        let streamed = online.finalize().unwrap();
        assert_close(
            &streamed.coefficients().to_row_major_f64().unwrap(),
            &batch.coefficients().to_row_major_f64().unwrap(),
            1e-9,
        );
    }

    #[test]
    fn test_singular_system() {
        let x = Table::from_rows(vec![1.0f64, 2.0, 1.0, 2.0], 2, 2).unwrap();
        let y = Table::column(vec![1.0f64, 1.0]).unwrap();
        let err = compute::train(&LinearRegressionDescriptor::default(), &x, &y).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ComputationError);
    }

    #[test]
    fn test_row_count_mismatch() {
        let x = Table::column(vec![1.0f64, 2.0]).unwrap();
        let y = Table::column(vec![1.0f64]).unwrap();
        let err = compute::train(&LinearRegressionDescriptor::default(), &x, &y).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_bad_alpha() {
        let desc = LinearRegressionDescriptor::default().with_alpha(-1.0);
        assert!(desc.check().is_err());
        assert!(
            LinearRegressionDescriptor::default()
                .with_alpha(f64::NAN)
                .check()
                .is_err()
        );
    }
}
