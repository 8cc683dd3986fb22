//! Runtime support for the Lama VM.
//!
//! - [`Runtime`] / [`Collector`]: what the engine calls into
//! - [`Heap`]: an arena-backed implementation of both
//! - [`tag`]: s-expression tag hashing
//! - [`host`]: integer I/O

pub mod api;
pub mod error;
pub mod heap;
pub mod host;
pub mod objects;
pub mod tag;

pub use api::{Collector, Runtime};
pub use error::RuntimeError;
pub use heap::{Heap, StdioHeap};
pub use host::{Host, IoHost};
pub use objects::Object;
