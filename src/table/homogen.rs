//! Dense, single-dtype tables

use super::{DataLayout, TableKind, TableMetadata};
use crate::array::{Array, Buffer};
use crate::dtype::{DType, Element, dispatch_dtype};
use crate::error::{Error, Result};
use crate::runtime::{Event, MemoryDomain, memory, wait_all};
use std::ops::Range;

/// Dense table whose columns all share one dtype
///
/// The table is an immutable view over a [`Buffer`] of `row_count *
/// column_count` elements in either row-major or column-major order.
/// Wrapping user memory never copies: [`HomogenTable::get_data`] hands back
/// the very pointer the table was built from.
///
/// # Example
///
/// ```
/// use dalcore::array::Array;
/// use dalcore::table::{DataLayout, HomogenTable};
///
/// let data = Array::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// let table = HomogenTable::wrap(data.clone(), 3, 2, DataLayout::RowMajor).unwrap();
/// assert_eq!(table.get_data::<f64>().unwrap().as_ptr(), data.as_ptr());
///
/// let tail = table.row_slice(1..3).unwrap();
/// assert_eq!(tail.get_data::<f64>().unwrap().to_vec().unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
/// ```
#[derive(Clone, Debug)]
pub struct HomogenTable {
    data: Buffer,
    row_count: usize,
    column_count: usize,
    layout: DataLayout,
    metadata: TableMetadata,
}

impl HomogenTable {
    /// Wrap a typed array as a `row_count x column_count` table
    ///
    /// # Errors
    ///
    /// Returns a domain error if either dimension is zero or the array does
    /// not hold exactly `row_count * column_count` elements.
    pub fn wrap<T: Element>(
        data: Array<T>,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
    ) -> Result<Self> {
        Self::from_buffer(data.into_buffer(), row_count, column_count, layout)
    }

    /// Wrap a typed array once the operations producing it have finished
    ///
    /// `dependencies` are waited on before the table is built, so the result
    /// is safe to read from any domain.
    pub fn wrap_after<T: Element>(
        data: Array<T>,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
        dependencies: &[Event],
    ) -> Result<Self> {
        if !dependencies.is_empty() {
            tracing::debug!(count = dependencies.len(), "waiting on table dependencies");
            wait_all(dependencies)?;
        }
        Self::wrap(data, row_count, column_count, layout)
    }

    /// Wrap foreign memory without taking ownership
    ///
    /// # Safety
    /// - `ptr` must address `row_count * column_count` initialized elements
    ///   in `domain`
    /// - the memory must outlive the table and every table derived from it
    pub unsafe fn wrap_raw<T: Element>(
        ptr: *const T,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
        domain: &MemoryDomain,
    ) -> Result<Self> {
        let count = checked_element_count(row_count, column_count)?;
        // SAFETY: forwarded to the caller
        let data = unsafe { Array::wrap(ptr, count, domain)? };
        Self::wrap(data, row_count, column_count, layout)
    }

    /// Wrap foreign memory, releasing it through `deleter`
    ///
    /// # Safety
    /// - `ptr` must address `row_count * column_count` initialized elements
    ///   in `domain`
    /// - the memory must stay valid until `deleter` runs
    pub unsafe fn wrap_raw_with_deleter<T, F>(
        ptr: *mut T,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
        domain: &MemoryDomain,
        deleter: F,
    ) -> Result<Self>
    where
        T: Element,
        F: FnOnce() + Send + 'static,
    {
        let count = checked_element_count(row_count, column_count)?;
        // SAFETY: forwarded to the caller
        let data = unsafe { Array::wrap_with_deleter(ptr, count, domain, deleter)? };
        Self::wrap(data, row_count, column_count, layout)
    }

    /// Build a host table from a row-major vector
    pub fn from_vec<T: Element>(data: Vec<T>, row_count: usize, column_count: usize) -> Result<Self> {
        Self::wrap(Array::from_vec(data), row_count, column_count, DataLayout::RowMajor)
    }

    /// Build a table over an untyped buffer
    pub fn from_buffer(
        data: Buffer,
        row_count: usize,
        column_count: usize,
        layout: DataLayout,
    ) -> Result<Self> {
        let count = checked_element_count(row_count, column_count)?;
        if data.len() != count {
            return Err(Error::domain(format!(
                "{row_count}x{column_count} table needs {count} elements, buffer holds {}",
                data.len()
            )));
        }
        data.validate()?;

        Ok(Self {
            metadata: TableMetadata::homogeneous(data.dtype(), column_count),
            data,
            row_count,
            column_count,
            layout,
        })
    }

    /// Replace the column metadata
    ///
    /// The metadata must describe `column_count` columns, each of the
    /// table's dtype.
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
        if let Some(&other) = metadata.dtypes().iter().find(|&&d| d != self.data.dtype()) {
            return Err(Error::DTypeMismatch {
                lhs: self.data.dtype(),
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

    /// Element order
    #[inline]
    pub fn layout(&self) -> DataLayout {
        self.layout
    }

    /// Column metadata
    #[inline]
    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Always [`TableKind::Homogen`]
    #[inline]
    pub fn kind(&self) -> TableKind {
        TableKind::Homogen
    }

    /// Element type of every column
    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Memory domain of the data
    #[inline]
    pub fn domain(&self) -> &MemoryDomain {
        self.data.domain()
    }

    /// The untyped data
    #[inline]
    pub fn data(&self) -> &Buffer {
        &self.data
    }

    /// Typed handle to the data, sharing memory with the table
    pub fn get_data<T: Element>(&self) -> Result<Array<T>> {
        self.data.typed::<T>()
    }

    /// Table holding rows `range` of this one
    ///
    /// Row-major tables are sliced without copying. Column-major slices are
    /// gathered into a new buffer in the same domain.
    pub fn row_slice(&self, range: Range<usize>) -> Result<Self> {
        let rows = self.check_row_range(&range)?;
        let cols = self.column_count;

        match self.layout {
            DataLayout::RowMajor => {
                let data = self.data.slice(range.start * cols, rows * cols)?;
                Ok(Self {
                    data,
                    row_count: rows,
                    ..self.clone()
                })
            }
            DataLayout::ColumnMajor => {
                let target = Buffer::allocate(rows * cols, self.dtype(), self.domain())?;
                let events = (0..cols)
                    .map(|j| {
                        let src = self.data.slice(j * self.row_count + range.start, rows)?;
                        let dst = target.slice(j * rows, rows)?;
                        memory::copy(&dst, &src)
                    })
                    .collect::<Result<Vec<_>>>()?;
                wait_all(&events)?;
                Ok(Self {
                    data: target,
                    row_count: rows,
                    ..self.clone()
                })
            }
        }
    }

    /// Partition rows into `parts` contiguous, nearly equal blocks
    ///
    /// The first `row_count % parts` blocks get one extra row.
    pub fn split_rows(&self, parts: usize) -> Result<Vec<Self>> {
        split_ranges(self.row_count, parts)?
            .into_iter()
            .map(|range| self.row_slice(range))
            .collect()
    }

    /// Same data in `layout`, copying only if the layout changes
    pub fn to_layout(&self, layout: DataLayout) -> Result<Self> {
        if layout == self.layout {
            return Ok(self.clone());
        }
        let (rows, cols) = (self.row_count, self.column_count);
        let data = dispatch_dtype!(self.dtype(), T => {
            let values = self.data.typed::<T>()?.to_vec()?;
            let mut out = Vec::with_capacity(values.len());
            match layout {
                // column-major source
                DataLayout::RowMajor => {
                    for i in 0..rows {
                        out.extend((0..cols).map(|j| values[j * rows + i]));
                    }
                }
                DataLayout::ColumnMajor => {
                    for j in 0..cols {
                        out.extend((0..rows).map(|i| values[i * cols + j]));
                    }
                }
            }
            Array::from_slice(&out, self.domain())?.into_buffer()
        });
        Ok(Self {
            data,
            layout,
            ..self.clone()
        })
    }

    /// Deep copy into `domain`
    pub fn to_domain(&self, domain: &MemoryDomain) -> Result<Self> {
        Ok(Self {
            data: self.data.to_domain(domain)?,
            ..self.clone()
        })
    }

    fn check_row_range(&self, range: &Range<usize>) -> Result<usize> {
        if range.start >= range.end || range.end > self.row_count {
            return Err(Error::domain(format!(
                "row range {range:?} is empty or exceeds {} rows",
                self.row_count
            )));
        }
        Ok(range.end - range.start)
    }
}

fn checked_element_count(row_count: usize, column_count: usize) -> Result<usize> {
    if row_count == 0 {
        return Err(Error::domain("row_count must be positive"));
    }
    if column_count == 0 {
        return Err(Error::domain("column_count must be positive"));
    }
    row_count
        .checked_mul(column_count)
        .ok_or_else(|| Error::domain(format!("{row_count}x{column_count} overflows")))
}

/// Split `0..total` into `parts` contiguous, nearly equal ranges
pub(crate) fn split_ranges(total: usize, parts: usize) -> Result<Vec<Range<usize>>> {
    if parts == 0 || parts > total {
        return Err(Error::invalid_argument(
            "parts",
            format!("cannot split {total} rows into {parts} non-empty blocks"),
        ));
    }
    let (base, extra) = (total / parts, total % parts);
    let mut start = 0;
    Ok((0..parts)
        .map(|p| {
            let len = base + usize::from(p < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect())
}
