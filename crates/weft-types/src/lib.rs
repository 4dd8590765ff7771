//! Foundation types for Weft.
//!
//! Every other Weft crate depends on `weft-types`.
//!
//! # Key Types
//!
//! - [`Digest`] -- Content-addressed identifier of an object (32-byte hash)
//! - [`Object`] -- Immutable, typed record that makes up a stream
//! - [`Metadata`] -- Stream root, parent edges and sequence number of an object
//! - [`Parents`] -- Named groups of parent digests
//! - [`PeerId`] -- Address of a remote peer

pub mod digest;
pub mod error;
pub mod object;
pub mod peer;

pub use digest::Digest;
pub use error::{TypeError, TypeResult};
pub use object::{IntoObject, Metadata, Object, Parents};
pub use peer::PeerId;
