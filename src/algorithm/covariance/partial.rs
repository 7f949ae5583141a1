use crate::compute::{FlatReader, FlatWriter, PartialResult};
use crate::dispatch::cross_product_kernel;
use crate::error::{Error, Result};

const TAG: u32 = 0xC0;

/// Observation count, column sums and raw cross product `XᵀX`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CovariancePartial {
    pub(super) nobs: u64,
    pub(super) sums: Vec<f64>,
    /// Row-major `p x p`
    pub(super) crossproduct: Vec<f64>,
}

impl CovariancePartial {
    /// Number of rows accumulated
    pub fn observation_count(&self) -> u64 {
        self.nobs
    }

    /// Number of columns, `None` while empty
    pub fn column_count(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.sums.len())
    }

    /// Column sums
    pub fn sums(&self) -> &[f64] {
        &self.sums
    }

    /// Raw cross product, row-major
    pub fn crossproduct(&self) -> &[f64] {
        &self.crossproduct
    }

    pub(super) fn accumulate(&self, block: &[f64], cols: usize) -> Self {
        let mut next = if self.is_empty() {
            Self {
                nobs: 0,
                sums: vec![0.0; cols],
                crossproduct: vec![0.0; cols * cols],
            }
        } else {
            self.clone()
        };

        for row in block.chunks_exact(cols) {
            for (s, x) in next.sums.iter_mut().zip(row) {
                *s += x;
            }
        }
        cross_product_kernel().accumulate(block, cols, &mut next.crossproduct);
        next.nobs += (block.len() / cols) as u64;
        next
    }
}

impl PartialResult for CovariancePartial {
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
        if self.sums.len() != other.sums.len() {
            return Err(Error::invalid_argument(
                "other",
                format!(
                    "merging cross products of {} and {} columns",
                    self.sums.len(),
                    other.sums.len()
                ),
            ));
        }
        let add = |a: &[f64], b: &[f64]| -> Vec<f64> { a.iter().zip(b).map(|(x, y)| x + y).collect() };
        Ok(Self {
            nobs: self.nobs + other.nobs,
            sums: add(&self.sums, &other.sums),
            crossproduct: add(&self.crossproduct, &other.crossproduct),
        })
    }

    fn pack(&self) -> Vec<f64> {
        FlatWriter::new(TAG)
            .push_count(self.nobs)
            .push_slice(&self.sums)
            .push_slice(&self.crossproduct)
            .finish()
    }

    fn unpack(flat: &[f64]) -> Result<Self> {
        let mut reader = FlatReader::new(flat, TAG)?;
        let partial = Self {
            nobs: reader.read_count()?,
            sums: reader.read_slice()?.to_vec(),
            crossproduct: reader.read_slice()?.to_vec(),
        };
        reader.finish()?;
        let p = partial.sums.len();
        if partial.crossproduct.len() != p * p {
            return Err(Error::Communication(format!(
                "cross product of {} values for {p} columns",
                partial.crossproduct.len()
            )));
        }
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_crossproduct() {
        let p = CovariancePartial::default().accumulate(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(p.observation_count(), 2);
        assert_eq!(p.sums(), &[4.0, 6.0]);
        assert_eq!(p.crossproduct(), &[10.0, 14.0, 14.0, 20.0]);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = CovariancePartial::default().accumulate(&[1.0, 2.0], 2);
        let b = CovariancePartial::default().accumulate(&[3.0, 5.0, -1.0, 0.5], 2);
        assert_eq!(a.merge(&b).unwrap(), b.merge(&a).unwrap());
    }

    #[test]
    fn test_unpack_rejects_bad_shape() {
        let flat = FlatWriter::new(TAG)
            .push_count(1)
            .push_slice(&[1.0, 2.0])
            .push_slice(&[1.0])
            .finish();
        assert!(CovariancePartial::unpack(&flat).is_err());
    }
}
