//! Row-block access for kernels

use super::{DataLayout, Table};
use crate::array::Array;
use crate::dtype::{Element, dispatch_dtype};
use crate::error::{Error, Result};
use std::marker::PhantomData;
use std::ops::Range;

/// Reads rows of any table as a host, row-major block of `T`
///
/// The block is a zero-copy view when the table already holds host,
/// row-major data of type `T`. Every other combination (column-major order,
/// a different dtype, sparse storage, accelerator memory) is materialized
/// into a fresh host array.
pub struct RowAccessor<'a, T: Element> {
    table: &'a Table,
    _marker: PhantomData<T>,
}

impl<'a, T: Element> RowAccessor<'a, T> {
    /// Accessor over `table`
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            _marker: PhantomData,
        }
    }

    /// Rows `range` as a row-major block of `range.len() * column_count`
    pub fn pull(&self, range: Range<usize>) -> Result<Array<T>> {
        match self.table {
            Table::Empty => Err(Error::invalid_argument("table", "table has no data")),
            Table::Homogen(table) => {
                let slice = table.row_slice(range)?;
                if slice.dtype() == T::DTYPE
                    && slice.layout() == DataLayout::RowMajor
                    && slice.domain().is_host()
                {
                    return slice.get_data::<T>();
                }
                let row_major = slice.to_layout(DataLayout::RowMajor)?;
                convert(row_major.data())
            }
            Table::Csr(table) => {
                let dense = table.row_slice(range)?.to_dense(DataLayout::RowMajor)?;
                convert(dense.data())
            }
        }
    }

    /// All rows
    pub fn pull_all(&self) -> Result<Array<T>> {
        self.pull(0..self.table.row_count())
    }
}

fn convert<T: Element>(data: &crate::array::Buffer) -> Result<Array<T>> {
    if data.dtype() == T::DTYPE {
        return Ok(Array::from_vec(data.typed::<T>()?.to_vec()?));
    }
    let converted = dispatch_dtype!(data.dtype(), S => {
        data.typed::<S>()?
            .to_vec()?
            .into_iter()
            .map(|v| T::from_f64(v.to_f64()))
            .collect::<Vec<T>>()
    });
    Ok(Array::from_vec(converted))
}
