//! Typed array handle

use super::{Buffer, Ownership, Storage};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{MemoryDomain, memory};
use std::marker::PhantomData;
use std::ops::Range;

/// Reference-counted, typed, contiguous buffer
///
/// `Array<T>` is a [`Buffer`] whose dtype is known statically. Cloning is
/// zero-copy: all clones and slices share one allocation, released when the
/// last of them drops.
///
/// # Example
///
/// ```
/// use dalcore::array::Array;
///
/// let a = Array::from_vec(vec![1.0f64, 2.0, 3.0, 4.0]);
/// let tail = a.slice(2..4).unwrap();
/// assert_eq!(tail.as_slice().unwrap(), &[3.0, 4.0]);
/// assert_eq!(a.ref_count(), 2);
/// ```
pub struct Array<T: Element> {
    buffer: Buffer,
    _marker: PhantomData<T>,
}

impl<T: Element> Array<T> {
    pub(crate) fn from_buffer_unchecked(buffer: Buffer) -> Self {
        debug_assert_eq!(buffer.dtype(), T::DTYPE);
        Self {
            buffer,
            _marker: PhantomData,
        }
    }

    /// Allocate `count` zeroed elements in `domain`
    ///
    /// Fails with `OutOfMemory` if the domain cannot satisfy the request.
    pub fn allocate(domain: &MemoryDomain, count: usize) -> Result<Self> {
        Ok(Self::from_buffer_unchecked(Buffer::allocate(
            count,
            T::DTYPE,
            domain,
        )?))
    }

    /// Allocate `count` zeroed elements in host memory
    pub fn zeros(count: usize) -> Result<Self> {
        Self::allocate(&MemoryDomain::Host, count)
    }

    /// Allocate `count` elements in `domain`, all set to `value`
    pub fn full(domain: &MemoryDomain, count: usize, value: T) -> Result<Self> {
        let array = Self::allocate(domain, count)?;
        memory::fill(&array, value)?.wait()?;
        Ok(array)
    }

    /// Adopt a host vector without copying
    pub fn from_vec(data: Vec<T>) -> Self {
        let len = data.len();
        Self::from_buffer_unchecked(Buffer::from_parts(
            Storage::from_vec(data),
            len,
            T::DTYPE,
            true,
        ))
    }

    /// Copy host values into a new array in `domain`
    pub fn from_slice(data: &[T], domain: &MemoryDomain) -> Result<Self> {
        match domain {
            MemoryDomain::Host => Ok(Self::from_vec(data.to_vec())),
            MemoryDomain::Accelerator(_) => {
                let array = Self::allocate(domain, data.len())?;
                memory::copy_from_host(&array, data)?.wait()?;
                Ok(array)
            }
        }
    }

    /// Wrap foreign memory without taking ownership
    ///
    /// The result is read-only.
    ///
    /// # Safety
    /// - `ptr` must address `count` initialized elements in `domain`
    /// - the memory must outlive every handle derived from the result
    pub unsafe fn wrap(ptr: *const T, count: usize, domain: &MemoryDomain) -> Result<Self> {
        check_alignment(ptr)?;
        // SAFETY: forwarded to the caller
        let storage = unsafe {
            Storage::from_raw_parts(ptr as u64, byte_len::<T>(count)?, domain, None)?
        };
        Ok(Self::from_buffer_unchecked(Buffer::from_storage(
            storage, T::DTYPE, false,
        )?))
    }

    /// Wrap foreign memory, taking ownership through `deleter`
    ///
    /// `deleter` runs exactly once, when the last handle sharing the memory
    /// drops. The result is writable.
    ///
    /// # Safety
    /// - `ptr` must address `count` initialized elements in `domain`
    /// - the memory must stay valid until `deleter` runs
    pub unsafe fn wrap_with_deleter<F>(
        ptr: *mut T,
        count: usize,
        domain: &MemoryDomain,
        deleter: F,
    ) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        check_alignment(ptr)?;
        // SAFETY: forwarded to the caller
        let storage = unsafe {
            Storage::from_raw_parts(
                ptr as u64,
                byte_len::<T>(count)?,
                domain,
                Some(Box::new(deleter)),
            )?
        };
        Ok(Self::from_buffer_unchecked(Buffer::from_storage(
            storage, T::DTYPE, true,
        )?))
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the array is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Element type tag
    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Memory domain
    #[inline]
    pub fn domain(&self) -> &MemoryDomain {
        self.buffer.domain()
    }

    /// Whether writes through this handle are permitted
    #[inline]
    pub fn is_mutable(&self) -> bool {
        self.buffer.is_mutable()
    }

    /// Ownership policy of the underlying storage
    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.buffer.storage().ownership()
    }

    /// Number of handles sharing the underlying storage
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.buffer.storage().ref_count()
    }

    /// Raw pointer to the first element
    ///
    /// For wrapped memory this is exactly the pointer handed in.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.buffer.data_ptr() as *const T
    }

    /// Borrow the untyped view
    #[inline]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Convert into the untyped view
    #[inline]
    pub fn into_buffer(self) -> Buffer {
        self.buffer
    }

    /// The same array with writes disallowed
    pub fn read_only(&self) -> Self {
        Self::from_buffer_unchecked(self.buffer.read_only())
    }

    /// Borrow host data as a slice
    ///
    /// Accelerator memory cannot be read directly; use [`Self::to_vec`].
    pub fn as_slice(&self) -> Result<&[T]> {
        if !self.domain().is_host() {
            return Err(Error::unsupported(
                "as_slice",
                format!("data lives in {}; copy it to the host first", self.domain()),
            ));
        }
        if self.is_empty() {
            return Ok(&[]);
        }
        // SAFETY: host memory, aligned for T, len elements within storage that
        // lives at least as long as &self
        Ok(unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len()) })
    }

    /// Copy all elements to a host vector (works in any domain)
    pub fn to_vec(&self) -> Result<Vec<T>> {
        if self.domain().is_host() {
            return Ok(self.as_slice()?.to_vec());
        }
        let mut out = vec![T::zero(); self.len()];
        memory::copy_to_host(self, &mut out)?;
        Ok(out)
    }

    /// Zero-copy view of a sub-range
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        let len = range.end.checked_sub(range.start).ok_or_else(|| {
            Error::invalid_argument("range", format!("{range:?} is reversed"))
        })?;
        Ok(Self::from_buffer_unchecked(
            self.buffer.slice(range.start, len)?,
        ))
    }

    /// Deep copy into `domain`, blocking until the copy completes
    pub fn to_domain(&self, domain: &MemoryDomain) -> Result<Self> {
        Ok(Self::from_buffer_unchecked(self.buffer.to_domain(domain)?))
    }
}

fn check_alignment<T>(ptr: *const T) -> Result<()> {
    if (ptr as usize) % std::mem::align_of::<T>() != 0 {
        return Err(Error::invalid_argument(
            "ptr",
            format!("{ptr:p} is not aligned for {}", std::any::type_name::<T>()),
        ));
    }
    Ok(())
}

fn byte_len<T>(count: usize) -> Result<usize> {
    count.checked_mul(std::mem::size_of::<T>()).ok_or_else(|| {
        Error::invalid_argument(
            "count",
            format!("{count} elements of {} overflow usize", std::any::type_name::<T>()),
        )
    })
}

impl<T: Element> Clone for Array<T> {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self::from_buffer_unchecked(self.buffer.clone())
    }
}

impl<T: Element> From<Vec<T>> for Array<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

impl<T: Element> std::fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("dtype", &T::DTYPE)
            .field("buffer", &self.buffer)
            .finish()
    }
}
