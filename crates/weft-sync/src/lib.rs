//! Peer-to-peer synchronization of Weft streams.
//!
//! Keeps a local stream graph converging toward the union of what remote
//! peers hold for the same stream, using only content-addressed requests.
//! Convergence is best-effort: unreachable providers and missing objects are
//! reported, never fatal.
//!
//! # Key Types
//!
//! - [`TopographicalSync`] -- serves digest listings and objects, fetches missing objects
//! - [`Network`] / [`Resolver`] -- transport and provider lookup seams
//! - [`MemoryHub`] / [`MemoryNetwork`] / [`MemoryResolver`] -- in-process implementations
//! - [`SyncConfig`] -- page size, timeouts and channel capacity
//! - [`FetchResult`] -- fetched count plus collected non-fatal errors

pub mod config;
pub mod error;
pub mod memory;
pub mod strategy;
pub mod transport;
pub mod types;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use memory::{MemoryHub, MemoryNetwork, MemoryResolver};
pub use strategy::{SyncHandle, TopographicalSync};
pub use transport::{Envelope, MessageFilter, Network, Resolver, Subscription};
pub use types::FetchResult;
