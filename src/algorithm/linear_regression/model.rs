use crate::algorithm::{computed, matrix_table, row_table};
use crate::compute::ResultOptions;
use crate::error::{Error, Result};
use crate::table::{RowAccessor, Table};

/// Trained linear model
#[derive(Clone, Debug)]
pub struct LinearRegressionModel {
    options: ResultOptions,
    feature_count: usize,
    response_count: usize,
    /// `r x (p + 1)`, intercept in column 0 (zero without intercept)
    betas: Vec<f64>,
    coefficients: Table,
    intercept: Table,
}

impl LinearRegressionModel {
    pub(super) fn new(
        betas: Vec<f64>,
        feature_count: usize,
        response_count: usize,
        with_intercept: bool,
    ) -> Result<Self> {
        let full = feature_count + 1;
        let coefficients: Vec<f64> = betas
            .chunks_exact(full)
            .flat_map(|row| row[1..].iter().copied())
            .collect();
        let (options, intercept) = if with_intercept {
            let values = betas.chunks_exact(full).map(|row| row[0]).collect();
            (
                ResultOptions::COEFFICIENTS | ResultOptions::INTERCEPT,
                row_table(values)?,
            )
        } else {
            (ResultOptions::COEFFICIENTS, Table::Empty)
        };

        Ok(Self {
            options,
            feature_count,
            response_count,
            coefficients: matrix_table(coefficients, response_count, feature_count)?,
            intercept,
            betas,
        })
    }

    /// Outputs the model holds
    pub fn options(&self) -> ResultOptions {
        self.options
    }

    /// Number of features the model was trained on
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Number of response columns
    pub fn response_count(&self) -> usize {
        self.response_count
    }

    /// `r x p` coefficients, one row per response
    pub fn coefficients(&self) -> &Table {
        &self.coefficients
    }

    /// `1 x r` intercepts
    pub fn intercept(&self) -> Result<&Table> {
        computed(&self.intercept, "intercept")
    }

    /// Predict responses for every row of `data`
    ///
    /// Returns an `n x r` dense table.
    pub fn infer(&self, data: &Table) -> Result<Table> {
        if data.column_count() != self.feature_count {
            return Err(Error::invalid_argument(
                "data",
                format!(
                    "{} columns for a model of {} features",
                    data.column_count(),
                    self.feature_count
                ),
            ));
        }
        let x = RowAccessor::<f64>::new(data).pull_all()?;
        let full = self.feature_count + 1;

        let mut predictions = Vec::with_capacity(data.row_count() * self.response_count);
        for row in x.as_slice()?.chunks_exact(self.feature_count) {
            for beta in self.betas.chunks_exact(full) {
                let dot: f64 = row.iter().zip(&beta[1..]).map(|(a, b)| a * b).sum();
                predictions.push(beta[0] + dot);
            }
        }
        matrix_table(predictions, data.row_count(), self.response_count)
    }
}
