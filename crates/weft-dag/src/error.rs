//! Error types for the stream graph.

use std::fmt;

/// Structural integrity violations reported by [`Graph::verify`].
///
/// These indicate a corrupt stream, not a transient condition.
///
/// [`Graph::verify`]: crate::Graph::verify
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError<K: fmt::Debug> {
    /// More than one node has no parents.
    #[error("multiple roots: {0:?}")]
    MultipleRoots(Vec<K>),

    /// A parent reference points to a node that does not exist.
    #[error("missing parent {parent:?} referenced by {node:?}")]
    MissingParent {
        /// The node containing the bad reference.
        node: K,
        /// The missing parent.
        parent: K,
    },

    /// A node is reachable from itself through parent edges.
    #[error("cycle detected involving node {0:?}")]
    Cycle(K),
}

/// Convenience alias for graph results.
pub type GraphResult<T, K> = Result<T, GraphError<K>>;
