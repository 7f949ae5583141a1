//! Tables: the input and output type of every algorithm
//!
//! A [`Table`] is an immutable, shareable, two-dimensional view over one or
//! more buffers. Three kinds exist:
//!
//! - [`Table::Empty`]: no data; what results hold before they are computed
//! - [`HomogenTable`]: dense, single dtype, row- or column-major
//! - [`CsrTable`]: compressed sparse rows with zero- or one-based indices
//!
//! Kernels read tables through [`RowAccessor`], which yields host row-major
//! blocks regardless of how the table stores its data.

mod accessor;
mod csr;
mod homogen;
mod metadata;

pub use accessor::RowAccessor;
pub use csr::{CsrIndexing, CsrTable};
pub use homogen::HomogenTable;
pub use metadata::{DataLayout, FeatureType, TableKind, TableMetadata};

pub(crate) use homogen::split_ranges;

use crate::array::Array;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::MemoryDomain;
use std::ops::Range;

/// Polymorphic table
#[derive(Clone, Debug, Default)]
pub enum Table {
    /// No data
    #[default]
    Empty,
    /// Dense data
    Homogen(HomogenTable),
    /// Sparse data
    Csr(CsrTable),
}

impl Table {
    /// Variant of this table
    pub fn kind(&self) -> TableKind {
        match self {
            Self::Empty => TableKind::Empty,
            Self::Homogen(_) => TableKind::Homogen,
            Self::Csr(_) => TableKind::Csr,
        }
    }

    /// Number of rows (0 for an empty table)
    pub fn row_count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Homogen(t) => t.row_count(),
            Self::Csr(t) => t.row_count(),
        }
    }

    /// Number of columns (0 for an empty table)
    pub fn column_count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Homogen(t) => t.column_count(),
            Self::Csr(t) => t.column_count(),
        }
    }

    /// Check whether the table holds data
    #[inline]
    pub fn has_data(&self) -> bool {
        !matches!(self, Self::Empty)
    }

    /// Column metadata, if the table holds data
    pub fn metadata(&self) -> Option<&TableMetadata> {
        match self {
            Self::Empty => None,
            Self::Homogen(t) => Some(t.metadata()),
            Self::Csr(t) => Some(t.metadata()),
        }
    }

    /// Memory domain of the data, if the table holds data
    pub fn domain(&self) -> Option<&MemoryDomain> {
        match self {
            Self::Empty => None,
            Self::Homogen(t) => Some(t.domain()),
            Self::Csr(t) => Some(t.domain()),
        }
    }

    /// The dense table, if this is one
    pub fn as_homogen(&self) -> Option<&HomogenTable> {
        match self {
            Self::Homogen(t) => Some(t),
            _ => None,
        }
    }

    /// The sparse table, if this is one
    pub fn as_csr(&self) -> Option<&CsrTable> {
        match self {
            Self::Csr(t) => Some(t),
            _ => None,
        }
    }

    /// Table holding rows `range` of this one
    pub fn row_slice(&self, range: Range<usize>) -> Result<Self> {
        match self {
            Self::Empty => Err(Error::invalid_argument("table", "cannot slice an empty table")),
            Self::Homogen(t) => t.row_slice(range).map(Self::Homogen),
            Self::Csr(t) => t.row_slice(range).map(Self::Csr),
        }
    }

    /// Partition rows into `parts` contiguous, nearly equal blocks
    pub fn split_rows(&self, parts: usize) -> Result<Vec<Self>> {
        split_ranges(self.row_count(), parts)?
            .into_iter()
            .map(|range| self.row_slice(range))
            .collect()
    }

    /// Host copy of the whole table as row-major f64 values
    pub fn to_row_major_f64(&self) -> Result<Vec<f64>> {
        RowAccessor::<f64>::new(self).pull_all()?.to_vec()
    }

    /// Dense host table from a row-major vector
    pub fn from_rows<T: Element>(data: Vec<T>, row_count: usize, column_count: usize) -> Result<Self> {
        HomogenTable::from_vec(data, row_count, column_count).map(Self::Homogen)
    }

    /// Dense single-column host table
    pub fn column<T: Element>(data: Vec<T>) -> Result<Self> {
        let rows = data.len();
        Self::from_rows(data, rows, 1)
    }

    /// Dense single-row table over an existing array
    pub fn row<T: Element>(data: Array<T>) -> Result<Self> {
        let cols = data.len();
        HomogenTable::wrap(data, 1, cols, DataLayout::RowMajor).map(Self::Homogen)
    }
}

impl From<HomogenTable> for Table {
    fn from(table: HomogenTable) -> Self {
        Self::Homogen(table)
    }
}

impl From<CsrTable> for Table {
    fn from(table: CsrTable) -> Self {
        Self::Csr(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let table = Table::default();
        assert_eq!(table.kind(), TableKind::Empty);
        assert_eq!(table.row_count(), 0);
        assert!(!table.has_data());
        assert!(table.metadata().is_none());
        assert!(table.row_slice(0..1).is_err());
    }

    #[test]
    fn test_dispatch_to_variants() {
        let dense = Table::from_rows(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2).unwrap();
        assert_eq!(dense.kind(), TableKind::Homogen);
        assert_eq!(dense.column_count(), 2);
        assert_eq!(dense.row_slice(1..2).unwrap().to_row_major_f64().unwrap(), vec![3.0, 4.0]);

        let sparse = Table::from(
            CsrTable::from_vecs(vec![1.0f64], vec![0], vec![0, 1, 1], 2, 2, CsrIndexing::ZeroBased)
                .unwrap(),
        );
        assert_eq!(sparse.kind(), TableKind::Csr);
        assert_eq!(sparse.split_rows(2).unwrap().len(), 2);
        assert_eq!(dense.metadata(), sparse.metadata());
    }

    #[test]
    fn test_row_and_column_helpers() {
        let column = Table::column(vec![1.0f64, 2.0, 3.0]).unwrap();
        assert_eq!((column.row_count(), column.column_count()), (3, 1));

        let row = Table::row(Array::from_vec(vec![1i64, 2])).unwrap();
        assert_eq!((row.row_count(), row.column_count()), (1, 2));
    }
}
