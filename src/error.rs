//! Error types for dalcore

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using dalcore's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dalcore operations
///
/// Errors are raised at the point of detection and propagate unmodified.
/// Nothing in this crate retries or swallows them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Structural invariant violated while constructing a table
    #[error("Domain error: {reason}")]
    Domain {
        /// What invariant was violated
        reason: String,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Shape mismatch between a chunk and the accumulator, or between merge inputs
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// DType mismatch between operands
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Expected dtype
        lhs: DType,
        /// Actual dtype
        rhs: DType,
    },

    /// Allocation failure in a memory domain
    #[error("Out of memory: failed to allocate {size} bytes in {domain}")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
        /// Name of the memory domain
        domain: String,
    },

    /// Finalize called on a state that cannot produce a valid result
    #[error("Computation error: {reason}")]
    Computation {
        /// Why no result could be produced
        reason: String,
    },

    /// Operation is valid in general but not for this domain or layout
    #[error("Unsupported operation '{op}': {reason}")]
    Unsupported {
        /// The operation being attempted
        op: &'static str,
        /// Description of the limitation
        reason: String,
    },

    /// A collective call observed an inconsistent peer contribution
    #[error("Communication error: {0}")]
    Communication(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error category, one per entry of the failure taxonomy
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Structural invariant violation in table construction
    DomainError,
    /// Mismatched shapes, dtypes or otherwise bad inputs
    InvalidArgument,
    /// Allocation failure in either memory domain
    BadAlloc,
    /// Finalize on a state that cannot produce a result
    ComputationError,
    /// Anything else (unsupported operation, collective or internal failure)
    Other,
}

impl Error {
    /// Create a domain error
    pub fn domain(reason: impl Into<String>) -> Self {
        Self::Domain {
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a computation error
    pub fn computation(reason: impl Into<String>) -> Self {
        Self::Computation {
            reason: reason.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            op,
            reason: reason.into(),
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain { .. } => ErrorKind::DomainError,
            Self::InvalidArgument { .. }
            | Self::ShapeMismatch { .. }
            | Self::DTypeMismatch { .. } => ErrorKind::InvalidArgument,
            Self::OutOfMemory { .. } => ErrorKind::BadAlloc,
            Self::Computation { .. } => ErrorKind::ComputationError,
            Self::Unsupported { .. } | Self::Communication(_) | Self::Internal(_) => {
                ErrorKind::Other
            }
        }
    }
}
