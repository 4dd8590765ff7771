//! Graph node type.

/// A node in a [`Graph`](crate::Graph).
///
/// `parents` lists the keys this node descends from, in insertion order.
/// A node with no parents is the root of its graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<K, V> {
    /// Content-addressed key.
    pub key: K,
    /// Associated metadata.
    pub value: V,
    /// Parent keys (empty for the root).
    pub parents: Vec<K>,
}

impl<K, V> Node<K, V> {
    /// Create a node with the given parents.
    pub fn new(key: K, value: V, parents: Vec<K>) -> Self {
        Self { key, value, parents }
    }

    /// Create a parentless (root) node.
    pub fn root(key: K, value: V) -> Self {
        Self::new(key, value, Vec::new())
    }

    /// Returns `true` if this node has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}
