use crate::compute::{FlatReader, FlatWriter, PartialResult};
use crate::error::{Error, Result};

const TAG: u32 = 0xB5;

/// Running per-column moments
///
/// Empty until the first chunk; afterwards every vector has one entry per
/// column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasicStatisticsPartial {
    pub(super) nobs: u64,
    pub(super) min: Vec<f64>,
    pub(super) max: Vec<f64>,
    pub(super) sum: Vec<f64>,
    pub(super) sum_squares: Vec<f64>,
}

impl BasicStatisticsPartial {
    /// Number of rows accumulated
    pub fn observation_count(&self) -> u64 {
        self.nobs
    }

    /// Number of columns, `None` while empty
    pub fn column_count(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.sum.len())
    }

    /// Per-column sums
    pub fn sum(&self) -> &[f64] {
        &self.sum
    }

    /// Per-column sums of squares
    pub fn sum_squares(&self) -> &[f64] {
        &self.sum_squares
    }

    /// Fold rows of a row-major block into a copy of this accumulator
    pub(super) fn accumulate(&self, block: &[f64], cols: usize) -> Self {
        let mut next = if self.is_empty() {
            Self {
                nobs: 0,
                min: vec![f64::INFINITY; cols],
                max: vec![f64::NEG_INFINITY; cols],
                sum: vec![0.0; cols],
                sum_squares: vec![0.0; cols],
            }
        } else {
            self.clone()
        };

        for row in block.chunks_exact(cols) {
            for (j, &x) in row.iter().enumerate() {
                next.min[j] = next.min[j].min(x);
                next.max[j] = next.max[j].max(x);
                next.sum[j] += x;
                next.sum_squares[j] += x * x;
            }
            next.nobs += 1;
        }
        next
    }
}

impl PartialResult for BasicStatisticsPartial {
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
        if self.sum.len() != other.sum.len() {
            return Err(Error::invalid_argument(
                "other",
                format!(
                    "merging moments of {} and {} columns",
                    self.sum.len(),
                    other.sum.len()
                ),
            ));
        }
        let zip = |a: &[f64], b: &[f64], f: fn(f64, f64) -> f64| -> Vec<f64> {
            a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
        };
        Ok(Self {
            nobs: self.nobs + other.nobs,
            min: zip(&self.min, &other.min, f64::min),
            max: zip(&self.max, &other.max, f64::max),
            sum: zip(&self.sum, &other.sum, |x, y| x + y),
            sum_squares: zip(&self.sum_squares, &other.sum_squares, |x, y| x + y),
        })
    }

    fn pack(&self) -> Vec<f64> {
        FlatWriter::new(TAG)
            .push_count(self.nobs)
            .push_slice(&self.min)
            .push_slice(&self.max)
            .push_slice(&self.sum)
            .push_slice(&self.sum_squares)
            .finish()
    }

    fn unpack(flat: &[f64]) -> Result<Self> {
        let mut reader = FlatReader::new(flat, TAG)?;
        let partial = Self {
            nobs: reader.read_count()?,
            min: reader.read_slice()?.to_vec(),
            max: reader.read_slice()?.to_vec(),
            sum: reader.read_slice()?.to_vec(),
            sum_squares: reader.read_slice()?.to_vec(),
        };
        reader.finish()?;

        let cols = partial.sum.len();
        if [&partial.min, &partial.max, &partial.sum_squares]
            .iter()
            .any(|v| v.len() != cols)
        {
            return Err(Error::Communication(
                "moment vectors of unequal length".into(),
            ));
        }
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_does_not_mutate_prior() {
        let empty = BasicStatisticsPartial::default();
        let one = empty.accumulate(&[1.0, -2.0], 2);
        let two = one.accumulate(&[3.0, 4.0], 2);

        assert!(empty.is_empty());
        assert_eq!(one.observation_count(), 1);
        assert_eq!(two.observation_count(), 2);
        assert_eq!(two.min, vec![1.0, -2.0]);
        assert_eq!(two.max, vec![3.0, 4.0]);
        assert_eq!(two.sum(), &[4.0, 2.0]);
        assert_eq!(two.sum_squares(), &[10.0, 20.0]);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let p = BasicStatisticsPartial::default().accumulate(&[1.0, 2.0, 3.0], 3);
        assert_eq!(p.merge(&Default::default()).unwrap(), p);
        assert_eq!(BasicStatisticsPartial::default().merge(&p).unwrap(), p);
    }

    #[test]
    fn test_merge_column_mismatch() {
        let a = BasicStatisticsPartial::default().accumulate(&[1.0, 2.0], 2);
        let b = BasicStatisticsPartial::default().accumulate(&[1.0], 1);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_pack_unpack() {
        let p = BasicStatisticsPartial::default().accumulate(&[1.0, 2.0, 5.0, 7.0], 2);
        assert_eq!(BasicStatisticsPartial::unpack(&p.pack()).unwrap(), p);

        let empty = BasicStatisticsPartial::default();
        assert_eq!(BasicStatisticsPartial::unpack(&empty.pack()).unwrap(), empty);
    }
}
