//! Content-addressing primitive for Weft.
//!
//! Provides domain-separated BLAKE3 hashing and the canonical digest of a
//! stream [`Object`](weft_types::Object). Wraps established libraries only.

pub mod hasher;

pub use hasher::{object_digest, ContentHasher, HasherError};
