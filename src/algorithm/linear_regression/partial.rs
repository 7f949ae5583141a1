use crate::compute::{FlatReader, FlatWriter, PartialResult};
use crate::dispatch::cross_product_kernel;
use crate::error::{Error, Result};

const TAG: u32 = 0x1F;

/// Normal-equation accumulators `XᵀX` and `Xᵀy`
///
/// `X` is augmented with a leading column of ones, so the same accumulator
/// serves models with and without an intercept.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearRegressionPartial {
    pub(super) nobs: u64,
    pub(super) features: usize,
    pub(super) responses: usize,
    /// Row-major `(p + 1) x (p + 1)`
    pub(super) xtx: Vec<f64>,
    /// Row-major `(p + 1) x r`
    pub(super) xty: Vec<f64>,
}

impl LinearRegressionPartial {
    /// Number of rows accumulated
    pub fn observation_count(&self) -> u64 {
        self.nobs
    }

    /// Number of features, `None` while empty
    pub fn feature_count(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.features)
    }

    /// Number of response columns, `None` while empty
    pub fn response_count(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.responses)
    }

    /// `x` is row-major `n x p`, `y` row-major `n x r`
    pub(super) fn accumulate(&self, x: &[f64], p: usize, y: &[f64], r: usize) -> Self {
        let q = p + 1;
        let mut next = if self.is_empty() {
            Self {
                nobs: 0,
                features: p,
                responses: r,
                xtx: vec![0.0; q * q],
                xty: vec![0.0; q * r],
            }
        } else {
            self.clone()
        };

        let rows = x.len() / p;
        let mut augmented = Vec::with_capacity(rows * q);
        for row in x.chunks_exact(p) {
            augmented.push(1.0);
            augmented.extend_from_slice(row);
        }
        cross_product_kernel().accumulate(&augmented, q, &mut next.xtx);

        for (a, targets) in augmented.chunks_exact(q).zip(y.chunks_exact(r)) {
            for (k, &ak) in a.iter().enumerate() {
                let out = &mut next.xty[k * r..(k + 1) * r];
                for (o, &t) in out.iter_mut().zip(targets) {
                    *o += ak * t;
                }
            }
        }
        next.nobs += rows as u64;
        next
    }
}

impl PartialResult for LinearRegressionPartial {
    fn is_empty(&self) -> bool {
        self.nobs == 0
    }

    fn merge(&self, other: &Self) -> Result<Self> {
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(other.clone());
        }
        if (self.features, self.responses) != (other.features, other.responses) {
            return Err(Error::invalid_argument(
                "other",
                format!(
                    "merging systems of {}x{} and {}x{} (features x responses)",
                    self.features, self.responses, other.features, other.responses
                ),
            ));
        }
        let add = |a: &[f64], b: &[f64]| -> Vec<f64> { a.iter().zip(b).map(|(x, y)| x + y).collect() };
        Ok(Self {
            nobs: self.nobs + other.nobs,
            features: self.features,
            responses: self.responses,
            xtx: add(&self.xtx, &other.xtx),
            xty: add(&self.xty, &other.xty),
        })
    }

    fn pack(&self) -> Vec<f64> {
        FlatWriter::new(TAG)
            .push_count(self.nobs)
            .push_count(self.features as u64)
            .push_count(self.responses as u64)
            .push_slice(&self.xtx)
            .push_slice(&self.xty)
            .finish()
    }

    fn unpack(flat: &[f64]) -> Result<Self> {
        let mut reader = FlatReader::new(flat, TAG)?;
        let partial = Self {
            nobs: reader.read_count()?,
            features: reader.read_count()? as usize,
            responses: reader.read_count()? as usize,
            xtx: reader.read_slice()?.to_vec(),
            xty: reader.read_slice()?.to_vec(),
        };
        reader.finish()?;

        if !partial.is_empty() {
            let q = partial.features + 1;
            if partial.xtx.len() != q * q || partial.xty.len() != q * partial.responses {
                return Err(Error::Communication(format!(
                    "normal equations of {} + {} values for {} features",
                    partial.xtx.len(),
                    partial.xty.len(),
                    partial.features
                )));
            }
        }
        Ok(partial)
    }
}
