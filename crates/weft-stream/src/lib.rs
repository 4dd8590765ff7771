//! Stream controllers for Weft.
//!
//! A stream is an append-only DAG of objects that all reference the same
//! root object. A [`StreamController`] owns the graph of one stream and is
//! the only way to mutate it: every event goes through
//! [`StreamController::apply`], which enforces the root, parent and sequence
//! rules and persists the object to an [`ObjectStore`](weft_store::ObjectStore).
//!
//! # Key Types
//!
//! - [`StreamController`] -- the per-stream state machine
//! - [`StreamManager`] -- controllers of every stream a node follows
//! - [`StreamInfo`] -- root description plus a record of every applied object
//! - [`ObjectInfo`] -- type, digest and metadata of one applied object

pub mod controller;
pub mod error;
pub mod info;
pub mod manager;

pub use controller::StreamController;
pub use error::{StreamError, StreamResult};
pub use info::{ObjectInfo, StreamInfo};
pub use manager::StreamManager;
