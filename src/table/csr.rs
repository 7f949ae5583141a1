//! Compressed sparse row tables

use super::{DataLayout, HomogenTable, TableKind, TableMetadata};
use crate::array::{Array, Buffer};
use crate::dtype::{DType, Element, dispatch_dtype};
use crate::error::{Error, Result};
use crate::runtime::{Event, MemoryDomain, wait_all};
use std::ops::Range;

/// Index base of the column indices and row offsets
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CsrIndexing {
    /// Indices start at 0
    #[default]
    ZeroBased,
    /// Indices start at 1
    OneBased,
}

impl CsrIndexing {
    /// Value of the first index
    #[inline]
    pub const fn base(self) -> i64 {
        match self {
            Self::ZeroBased => 0,
            Self::OneBased => 1,
        }
    }
}

/// Sparse table in compressed sparse row form
///
/// Row `i` holds the values `data[offsets[i] - base .. offsets[i + 1] - base]`
/// at columns `column_indices[..] - base` over the same range.
///
/// Construction validates the structure:
/// - `row_offsets` has `row_count + 1` entries
/// - the first offset is `base` and the last is `base + nnz`
/// - offsets never decrease
/// - every column index lies in `[base, base + column_count)`
#[derive(Clone, Debug)]
pub struct CsrTable {
    values: Buffer,
    column_indices: Array<i64>,
    row_offsets: Array<i64>,
    row_count: usize,
    column_count: usize,
    indexing: CsrIndexing,
    metadata: TableMetadata,
}

impl CsrTable {
    /// Wrap the three CSR component arrays
    ///
    /// All three arrays must live in the same domain. Accelerator-resident
    /// indices are copied to the host for validation; the table itself keeps
    /// the original arrays.
    ///
    /// # Errors
    ///
    /// Returns a domain error for zero dimensions or a malformed structure.
    pub fn wrap<T: Element>(
        values: Array<T>,
        column_indices: Array<i64>,
        row_offsets: Array<i64>,
        row_count: usize,
        column_count: usize,
        indexing: CsrIndexing,
    ) -> Result<Self> {
        Self::from_buffer(
            values.into_buffer(),
            column_indices,
            row_offsets,
            row_count,
            column_count,
            indexing,
        )
    }

    /// Wrap the component arrays once the operations producing them finish
    pub fn wrap_after<T: Element>(
        values: Array<T>,
        column_indices: Array<i64>,
        row_offsets: Array<i64>,
        row_count: usize,
        column_count: usize,
        indexing: CsrIndexing,
        dependencies: &[Event],
    ) -> Result<Self> {
        if !dependencies.is_empty() {
            tracing::debug!(count = dependencies.len(), "waiting on table dependencies");
            wait_all(dependencies)?;
        }
        Self::wrap(values, column_indices, row_offsets, row_count, column_count, indexing)
    }

    /// Wrap foreign CSR components without taking ownership
    ///
    /// # Safety
    /// - `values` and `column_indices` must each address `nnz` initialized
    ///   elements in `domain`
    /// - `row_offsets` must address `row_count + 1` initialized elements
    /// - the memory must outlive the table and every table derived from it
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn wrap_raw<T: Element>(
        values: *const T,
        column_indices: *const i64,
        row_offsets: *const i64,
        nnz: usize,
        row_count: usize,
        column_count: usize,
        indexing: CsrIndexing,
        domain: &MemoryDomain,
    ) -> Result<Self> {
        if row_count == 0 {
            return Err(Error::domain("row_count must be positive"));
        }
        // SAFETY: forwarded to the caller
        let (values, column_indices, row_offsets) = unsafe {
            (
                Array::wrap(values, nnz, domain)?,
                Array::wrap(column_indices, nnz, domain)?,
                Array::wrap(row_offsets, row_count + 1, domain)?,
            )
        };
        Self::wrap(values, column_indices, row_offsets, row_count, column_count, indexing)
    }

    /// Build a host table from component vectors
    pub fn from_vecs<T: Element>(
        values: Vec<T>,
        column_indices: Vec<i64>,
        row_offsets: Vec<i64>,
        row_count: usize,
        column_count: usize,
        indexing: CsrIndexing,
    ) -> Result<Self> {
        Self::wrap(
            Array::from_vec(values),
            Array::from_vec(column_indices),
            Array::from_vec(row_offsets),
            row_count,
            column_count,
            indexing,
        )
    }

    /// Build a table over an untyped values buffer
    pub fn from_buffer(
        values: Buffer,
        column_indices: Array<i64>,
        row_offsets: Array<i64>,
        row_count: usize,
        column_count: usize,
        indexing: CsrIndexing,
    ) -> Result<Self> {
        if row_count == 0 {
            return Err(Error::domain("row_count must be positive"));
        }
        if column_count == 0 {
            return Err(Error::domain("column_count must be positive"));
        }
        if values.domain() != column_indices.domain() || values.domain() != row_offsets.domain() {
            return Err(Error::domain(format!(
                "components live in different domains ({}, {}, {})",
                values.domain(),
                column_indices.domain(),
                row_offsets.domain()
            )));
        }
        if row_offsets.len() != row_count + 1 {
            return Err(Error::domain(format!(
                "row_offsets has {} entries, expected {}",
                row_offsets.len(),
                row_count + 1
            )));
        }
        if column_indices.len() != values.len() {
            return Err(Error::domain(format!(
                "{} column indices for {} values",
                column_indices.len(),
                values.len()
            )));
        }

        let offsets = row_offsets.to_vec()?;
        let columns = column_indices.to_vec()?;
        validate_structure(&offsets, &columns, column_count, indexing)?;

        Ok(Self {
            metadata: TableMetadata::homogeneous(values.dtype(), column_count),
            values,
            column_indices,
            row_offsets,
            row_count,
            column_count,
            indexing,
        })
    }

    /// Replace the column metadata
    pub fn with_metadata(mut self, metadata: TableMetadata) -> Result<Self> {
        if metadata.feature_count() != self.column_count {
            return Err(Error::invalid_argument(
                "metadata",
                format!(
                    "{} features for a table of {} columns",
                    metadata.feature_count(),
                    self.column_count
                ),
            ));
        }
        if let Some(&other) = metadata.dtypes().iter().find(|&&d| d != self.values.dtype()) {
            return Err(Error::DTypeMismatch {
                lhs: self.values.dtype(),
                rhs: other,
            });
        }
        self.metadata = metadata;
        Ok(self)
    }

    /// Number of rows
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Number of columns
    #[inline]
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Number of stored values
    #[inline]
    pub fn non_zero_count(&self) -> usize {
        self.values.len()
    }

    /// Index base
    #[inline]
    pub fn indexing(&self) -> CsrIndexing {
        self.indexing
    }

    /// Column metadata
    #[inline]
    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Always [`TableKind::Csr`]
    #[inline]
    pub fn kind(&self) -> TableKind {
        TableKind::Csr
    }

    /// Element type of the values
    #[inline]
    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Memory domain of the components
    #[inline]
    pub fn domain(&self) -> &MemoryDomain {
        self.values.domain()
    }

    /// The untyped values
    #[inline]
    pub fn values(&self) -> &Buffer {
        &self.values
    }

    /// Typed handle to the values, sharing memory with the table
    pub fn get_data<T: Element>(&self) -> Result<Array<T>> {
        self.values.typed::<T>()
    }

    /// Column index of every stored value
    #[inline]
    pub fn get_column_indices(&self) -> &Array<i64> {
        &self.column_indices
    }

    /// Row offsets (`row_count + 1` entries)
    #[inline]
    pub fn get_row_offsets(&self) -> &Array<i64> {
        &self.row_offsets
    }

    /// Table holding rows `range` of this one
    ///
    /// Values and column indices are shared with this table; only the row
    /// offsets are rebuilt.
    pub fn row_slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start >= range.end || range.end > self.row_count {
            return Err(Error::domain(format!(
                "row range {range:?} is empty or exceeds {} rows",
                self.row_count
            )));
        }
        let base = self.indexing.base();
        let offsets = self.row_offsets.to_vec()?;
        let first = offsets[range.start];
        let begin = (first - base) as usize;
        let end = (offsets[range.end] - base) as usize;

        let rebased: Vec<i64> = offsets[range.start..=range.end]
            .iter()
            .map(|&o| o - first + base)
            .collect();

        Ok(Self {
            values: self.values.slice(begin, end - begin)?,
            column_indices: self.column_indices.slice(begin..end)?,
            row_offsets: Array::from_slice(&rebased, self.domain())?,
            row_count: range.end - range.start,
            ..self.clone()
        })
    }

    /// Same structure with a different index base
    pub fn with_indexing(&self, indexing: CsrIndexing) -> Result<Self> {
        if indexing == self.indexing {
            return Ok(self.clone());
        }
        let shift = indexing.base() - self.indexing.base();
        let rebase = |array: &Array<i64>| -> Result<Array<i64>> {
            let shifted: Vec<i64> = array.to_vec()?.into_iter().map(|i| i + shift).collect();
            Array::from_slice(&shifted, array.domain())
        };
        Ok(Self {
            column_indices: rebase(&self.column_indices)?,
            row_offsets: rebase(&self.row_offsets)?,
            indexing,
            ..self.clone()
        })
    }

    /// Expand into a dense host table
    pub fn to_dense(&self, layout: DataLayout) -> Result<HomogenTable> {
        let (rows, cols) = (self.row_count, self.column_count);
        let base = self.indexing.base();
        let offsets = self.row_offsets.to_vec()?;
        let columns = self.column_indices.to_vec()?;

        let data = dispatch_dtype!(self.dtype(), T => {
            let values = self.values.typed::<T>()?.to_vec()?;
            let mut dense = vec![T::zero(); rows * cols];
            for i in 0..rows {
                let span = (offsets[i] - base) as usize..(offsets[i + 1] - base) as usize;
                for k in span {
                    let j = (columns[k] - base) as usize;
                    let at = match layout {
                        DataLayout::RowMajor => i * cols + j,
                        DataLayout::ColumnMajor => j * rows + i,
                    };
                    dense[at] = values[k];
                }
            }
            Array::from_vec(dense).into_buffer()
        });
        HomogenTable::from_buffer(data, rows, cols, layout)?.with_metadata(self.metadata.clone())
    }
}

fn validate_structure(
    offsets: &[i64],
    columns: &[i64],
    column_count: usize,
    indexing: CsrIndexing,
) -> Result<()> {
    let base = indexing.base();
    let nnz = columns.len() as i64;

    let first = offsets.first().copied().unwrap_or(base);
    if first != base {
        return Err(Error::domain(format!(
            "first row offset is {first}, expected {base}"
        )));
    }
    let last = offsets.last().copied().unwrap_or(base);
    if last != base + nnz {
        return Err(Error::domain(format!(
            "last row offset is {last}, expected {}",
            base + nnz
        )));
    }
    if let Some(row) = offsets.windows(2).position(|w| w[1] < w[0]) {
        return Err(Error::domain(format!(
            "row offsets decrease at row {row} ({} > {})",
            offsets[row],
            offsets[row + 1]
        )));
    }
    let upper = base + column_count as i64;
    if let Some(k) = columns.iter().position(|&c| c < base || c >= upper) {
        return Err(Error::domain(format!(
            "column index {} at position {k} outside [{base}, {upper})",
            columns[k]
        )));
    }
    Ok(())
}
