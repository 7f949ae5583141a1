//! Data type system for table columns and arrays
//!
//! `DType` is the runtime tag carried by every buffer and every column of a
//! table's metadata. `Element` connects Rust scalar types to those tags.

mod element;

pub use element::Element;

use std::fmt;

/// Data types a buffer or table column may hold
///
/// # Discriminant Values
///
/// Discriminants are stable: floats 0-9, signed ints 10-19, unsigned ints
/// 20-29. Existing values are never changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
    /// 64-bit signed integer (also used for sparse indices)
    I64 = 10,
    /// 32-bit signed integer
    I32 = 11,
    /// 8-bit unsigned integer
    U8 = 23,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 | Self::I64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::U8 => 1,
        }
    }

    /// Returns true for floating point types
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32)
    }

    /// Returns true for integer types
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I64 | Self::I32 | Self::U8)
    }

    /// Short lowercase name
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::U8 => "u8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Dispatch on a runtime dtype, binding the matching Rust type to `$T`
///
/// ```ignore
/// dispatch_dtype!(buffer.dtype(), T => { buffer.typed::<T>()?.to_vec_f64() })
/// ```
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::I64 => {
                type $T = i64;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DType::U8 => {
                type $T = u8;
                $body
            }
        }
    };
}

pub(crate) use dispatch_dtype;
