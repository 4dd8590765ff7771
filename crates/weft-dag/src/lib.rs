//! Stream graph for Weft.
//!
//! A generic, lock-protected directed acyclic graph keyed by content digest.
//! Nodes carry arbitrary metadata and an ordered list of parent keys; the
//! single parentless node is the root. The graph accepts any insertion and
//! validates lazily, so partially synchronized streams can be held while
//! their missing ancestors are still being fetched.

pub mod error;
pub mod graph;
pub mod node;

pub use error::{GraphError, GraphResult};
pub use graph::Graph;
pub use node::Node;
