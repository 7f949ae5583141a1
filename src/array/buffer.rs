//! Untyped window into a storage

use super::{Array, Storage};
use crate::dtype::{DType, Element, dispatch_dtype};
use crate::error::{Error, Result};
use crate::runtime::{MemoryDomain, memory};

/// Untyped, reference-counted view of `len` elements of one dtype
///
/// Tables hold their columns and sparse components as buffers, so a table
/// can carry any dtype while sharing memory with the arrays it was built
/// from. Reading through a buffer never mutates shared state, which makes
/// concurrent readers on different threads safe.
#[derive(Clone)]
pub struct Buffer {
    storage: Storage,
    /// Offset into storage, in elements
    offset: usize,
    len: usize,
    dtype: DType,
    mutable: bool,
}

impl Buffer {
    /// Allocate `len` zeroed elements in `domain`
    pub fn allocate(len: usize, dtype: DType, domain: &MemoryDomain) -> Result<Self> {
        let size_bytes = len
            .checked_mul(dtype.size_in_bytes())
            .ok_or_else(|| Error::OutOfMemory {
                size: usize::MAX,
                domain: domain.name(),
            })?;
        let storage = Storage::allocate(size_bytes, domain)?;
        Ok(Self {
            storage,
            offset: 0,
            len,
            dtype,
            mutable: true,
        })
    }

    /// View an entire storage as elements of `dtype`
    pub fn from_storage(storage: Storage, dtype: DType, mutable: bool) -> Result<Self> {
        let elem = dtype.size_in_bytes();
        if storage.size_in_bytes() % elem != 0 {
            return Err(Error::invalid_argument(
                "storage",
                format!(
                    "{} bytes is not a whole number of {dtype} elements",
                    storage.size_in_bytes()
                ),
            ));
        }
        if storage.ptr() % elem as u64 != 0 {
            return Err(Error::invalid_argument(
                "storage",
                format!("pointer 0x{:x} is not aligned for {dtype}", storage.ptr()),
            ));
        }
        Ok(Self {
            len: storage.size_in_bytes() / elem,
            storage,
            offset: 0,
            dtype,
            mutable,
        })
    }

    /// View the first `len` elements of a storage known to hold them
    pub(crate) fn from_parts(storage: Storage, len: usize, dtype: DType, mutable: bool) -> Self {
        debug_assert!(len * dtype.size_in_bytes() <= storage.size_in_bytes());
        Self {
            storage,
            offset: 0,
            len,
            dtype,
            mutable,
        }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the view is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Memory domain of the underlying storage
    #[inline]
    pub fn domain(&self) -> &MemoryDomain {
        self.storage.domain()
    }

    /// The underlying storage
    #[inline]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Offset into the storage, in elements
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether writes through this view are permitted
    #[inline]
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Size of the viewed range in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.len * self.dtype.size_in_bytes()
    }

    /// Address of the first viewed element
    #[inline]
    pub fn data_ptr(&self) -> u64 {
        if self.len == 0 && self.storage.ptr() == 0 {
            return 0;
        }
        self.storage.ptr() + (self.offset * self.dtype.size_in_bytes()) as u64
    }

    /// Check whether two views share one allocation
    #[inline]
    pub fn shares_storage(&self, other: &Self) -> bool {
        self.storage.ptr_eq(&other.storage)
    }

    /// Zero-copy view of `len` elements starting at `start`
    pub fn slice(&self, start: usize, len: usize) -> Result<Self> {
        match start.checked_add(len) {
            Some(end) if end <= self.len => Ok(Self {
                storage: self.storage.clone(),
                offset: self.offset + start,
                len,
                dtype: self.dtype,
                mutable: self.mutable,
            }),
            _ => Err(Error::invalid_argument(
                "range",
                format!(
                    "{start}..{} out of bounds for {} elements",
                    start.saturating_add(len),
                    self.len
                ),
            )),
        }
    }

    /// The same view with writes disallowed
    pub fn read_only(&self) -> Self {
        Self {
            mutable: false,
            ..self.clone()
        }
    }

    /// Typed view of this buffer
    pub fn typed<T: Element>(&self) -> Result<Array<T>> {
        if T::DTYPE != self.dtype {
            return Err(Error::DTypeMismatch {
                lhs: T::DTYPE,
                rhs: self.dtype,
            });
        }
        Ok(Array::from_buffer_unchecked(self.clone()))
    }

    /// Deep copy into `domain`, blocking until the copy completes
    pub fn to_domain(&self, domain: &MemoryDomain) -> Result<Self> {
        let target = Self::allocate(self.len, self.dtype, domain)?;
        memory::copy(&target, self)?.wait()?;
        Ok(target)
    }

    /// Copy all elements to the host, converted to f64
    pub fn to_vec_f64(&self) -> Result<Vec<f64>> {
        dispatch_dtype!(self.dtype, T => {
            let values = self.typed::<T>()?.to_vec()?;
            Ok(values.into_iter().map(Element::to_f64).collect())
        })
    }

    /// Check that the viewed range lies inside the storage
    pub(crate) fn validate(&self) -> Result<()> {
        self.storage.check_range(
            self.offset * self.dtype.size_in_bytes(),
            self.size_in_bytes(),
        )
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("ptr", &format!("0x{:x}", self.data_ptr()))
            .field("len", &self.len)
            .field("dtype", &self.dtype)
            .field("domain", self.domain())
            .field("mutable", &self.mutable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_shares_storage() {
        let buffer = Buffer::allocate(10, DType::F32, &MemoryDomain::Host).unwrap();
        let view = buffer.slice(4, 3).unwrap();

        assert!(view.shares_storage(&buffer));
        assert_eq!(view.len(), 3);
        assert_eq!(view.data_ptr(), buffer.data_ptr() + 16);
        assert!(buffer.slice(8, 3).is_err());
    }

    #[test]
    fn test_typed_checks_dtype() {
        let buffer = Buffer::allocate(2, DType::I64, &MemoryDomain::Host).unwrap();
        assert!(buffer.typed::<i64>().is_ok());
        assert!(matches!(
            buffer.typed::<f64>(),
            Err(Error::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_storage_requires_whole_elements() {
        let storage = Storage::allocate(12, &MemoryDomain::Host).unwrap();
        assert!(Buffer::from_storage(storage.clone(), DType::F32, true).is_ok());
        assert!(Buffer::from_storage(storage, DType::F64, true).is_err());
    }

    #[test]
    fn test_to_vec_f64_converts() {
        let array = Array::from_vec(vec![1i32, -2, 3]);
        assert_eq!(array.buffer().to_vec_f64().unwrap(), vec![1.0, -2.0, 3.0]);
    }
}
