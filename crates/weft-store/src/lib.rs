//! Content-addressed object storage for Weft.
//!
//! Stream controllers persist every accepted object through the
//! [`ObjectStore`] trait. The store is a pure key-value map from
//! [`Digest`](weft_types::Digest) to [`Object`](weft_types::Object); it never
//! interprets stream structure.
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Writes are idempotent: putting the same object twice stores it once.
//! 3. Concurrent reads are always safe.
//! 4. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
