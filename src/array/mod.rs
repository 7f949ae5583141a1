//! Reference-counted buffers
//!
//! Three layers, each a cheap handle over the one below:
//!
//! - [`Storage`]: one contiguous allocation in one memory domain, with an
//!   explicit ownership policy. Freed (or handed to its deleter) exactly once
//!   when the last handle drops.
//! - [`Buffer`]: an untyped window into a storage (element offset, length,
//!   dtype, mutability). This is what tables hold.
//! - [`Array<T>`]: a typed `Buffer`.
//!
//! Cloning any of them shares the allocation; nothing here deep-copies
//! unless asked to (`to_vec`, `to_domain`).

mod buffer;
mod storage;
mod typed;

pub use buffer::Buffer;
pub use storage::{Ownership, Storage};
pub use typed::Array;
