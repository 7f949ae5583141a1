//! # dalcore
//!
//! **Shared foundation for batch, online and distributed analytics.**
//!
//! dalcore provides the pieces every analytics algorithm sits on: reference
//! counted arrays living in host or accelerator memory, dense and CSR tables
//! viewing those arrays without copying, and a partial-computation protocol
//! that runs the same arithmetic single-shot, chunk by chunk, or across
//! SPMD ranks.
//!
//! ## Layers
//!
//! - **Memory**: [`runtime`] backends with domain-dispatching
//!   `copy`/`memset`/`fill`, returning awaitable [`runtime::Event`]s
//! - **Arrays**: [`array::Array`] with owning, borrowed or custom-deleter
//!   storage
//! - **Tables**: [`table::HomogenTable`] and [`table::CsrTable`], validated at
//!   construction
//! - **Protocol**: [`compute::PartialCompute`] / [`compute::PartialTrain`],
//!   driven by [`compute::compute`], [`compute::Online`] and [`compute::spmd`]
//! - **Ranks**: [`communicator::Communicator`] collectives, used only by the
//!   merge step
//!
//! ## Quick Start
//!
//! ```rust
//! use dalcore::prelude::*;
//! use dalcore::algorithm::basic_statistics::BasicStatisticsDescriptor;
//!
//! # fn main() -> dalcore::error::Result<()> {
//! let data = Table::from_rows(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2)?;
//!
//! let mut online = Online::new(BasicStatisticsDescriptor::default())?;
//! for part in data.split_rows(3)? {
//!     online.push(&part)?;
//! }
//! let streamed = online.finalize()?;
//!
//! let batch = dalcore::compute::compute(&BasicStatisticsDescriptor::default(), &data)?;
//! assert_eq!(
//!     streamed.mean()?.to_row_major_f64()?,
//!     batch.mean()?.to_row_major_f64()?,
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): parallel cross-product kernels on the host
//! - `serde`: `Serialize`/`Deserialize` for metadata and descriptors

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod algorithm;
pub mod array;
pub mod communicator;
pub mod compute;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod runtime;
pub mod table;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::array::{Array, Buffer};
    pub use crate::communicator::{Collectives, Communicator, ReduceOp, SingleRank, ThreadCommunicator};
    pub use crate::compute::{
        Checkable, Online, OnlineTrain, PartialCompute, PartialResult, PartialTrain, ResultOptions,
    };
    pub use crate::dtype::{DType, Element};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::runtime::accelerator::AcceleratorDevice;
    pub use crate::runtime::{Event, MemoryDomain};
    pub use crate::table::{
        CsrIndexing, CsrTable, DataLayout, FeatureType, HomogenTable, RowAccessor, Table,
        TableKind, TableMetadata,
    };
}
