//! The stream graph structure and its ordering algorithms.
//!
//! [`Graph`] stores nodes in a [`HashMap`] behind a single [`RwLock`].
//! Insertion never validates; [`Graph::verify`] checks the invariants on
//! demand and [`Graph::topological_sort`] runs it before ordering.
//!
//! # Invariants (checked by `verify`)
//!
//! - At most one node has no parents (the root).
//! - Every parent reference resolves to an existing node.
//! - No node is its own ancestor.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::RwLock;

use tracing::{debug, trace};

use crate::error::{GraphError, GraphResult};
use crate::node::Node;

/// A thread-safe DAG keyed by `K` with per-node metadata `V`.
///
/// Readers never observe a partially inserted node: every mutation happens
/// under the write lock.
pub struct Graph<K, V> {
    nodes: RwLock<HashMap<K, Node<K, V>>>,
}

impl<K, V> Default for Graph<K, V> {
    fn default() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Graph<K, V>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
    V: Clone,
{
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().expect("graph lock poisoned").len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().expect("graph lock poisoned").is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Insert a node, replacing any node with the same key.
    ///
    /// No validation happens here; call [`verify`](Self::verify) before
    /// relying on structural guarantees.
    pub fn add_node(&self, node: Node<K, V>) {
        trace!(key = ?node.key, parents = node.parents.len(), "adding graph node");
        self.nodes
            .write()
            .expect("graph lock poisoned")
            .insert(node.key.clone(), node);
    }

    /// Insert a node built from its parts.
    pub fn add(&self, key: K, value: V, parents: Vec<K>) {
        self.add_node(Node::new(key, value, parents));
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Returns `true` if a node with this key exists.
    pub fn contains(&self, key: &K) -> bool {
        self.nodes.read().expect("graph lock poisoned").contains_key(key)
    }

    /// Metadata of a node.
    pub fn get(&self, key: &K) -> Option<V> {
        self.nodes
            .read()
            .expect("graph lock poisoned")
            .get(key)
            .map(|n| n.value.clone())
    }

    /// Parent keys of a node.
    pub fn parents(&self, key: &K) -> Option<Vec<K>> {
        self.nodes
            .read()
            .expect("graph lock poisoned")
            .get(key)
            .map(|n| n.parents.clone())
    }

    /// All keys, sorted ascending.
    pub fn keys(&self) -> Vec<K> {
        let nodes = self.nodes.read().expect("graph lock poisoned");
        let mut keys: Vec<K> = nodes.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// All parentless nodes, sorted ascending. A valid graph has at most one.
    pub fn roots(&self) -> Vec<K> {
        let nodes = self.nodes.read().expect("graph lock poisoned");
        let mut roots: Vec<K> = nodes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.key.clone())
            .collect();
        roots.sort();
        roots
    }

    /// Nodes that no other node lists as a parent, sorted ascending.
    ///
    /// These are the current frontier of the graph: objects with no known
    /// descendants yet.
    pub fn leaves(&self) -> Vec<K> {
        let nodes = self.nodes.read().expect("graph lock poisoned");
        let referenced: HashSet<&K> = nodes.values().flat_map(|n| n.parents.iter()).collect();
        let mut leaves: Vec<K> = nodes
            .keys()
            .filter(|k| !referenced.contains(k))
            .cloned()
            .collect();
        leaves.sort();
        leaves
    }

    /// The given keys plus every node reachable from them through parent edges.
    ///
    /// Keys that are not (yet) in the graph are included but not expanded.
    pub fn ancestors(&self, keys: &[K]) -> HashSet<K> {
        let nodes = self.nodes.read().expect("graph lock poisoned");
        let mut visited: HashSet<K> = HashSet::new();
        let mut queue: VecDeque<&K> = VecDeque::new();

        for key in keys {
            if visited.insert(key.clone()) {
                queue.push_back(key);
            }
        }

        while let Some(current) = queue.pop_front() {
            if let Some(node) = nodes.get(current) {
                for parent in &node.parents {
                    if visited.insert(parent.clone()) {
                        queue.push_back(parent);
                    }
                }
            }
        }

        visited
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Validate the graph's structural integrity.
    ///
    /// Fails on multiple roots, on the first missing parent (in key order),
    /// or on a cycle.
    pub fn verify(&self) -> GraphResult<(), K> {
        let nodes = self.nodes.read().expect("graph lock poisoned");
        check(&nodes)
    }

    // ---------------------------------------------------------------
    // Topological sort
    // ---------------------------------------------------------------

    /// All keys in a deterministic root-first order.
    ///
    /// Kahn's algorithm run from the leaves towards the root. A node becomes
    /// ready once every node listing it as a parent has been emitted. Among
    /// ready nodes the one with the fewest ancestors wins, then the one with
    /// the most votes from already emitted descendants, then the greatest
    /// key. The emitted list is reversed at the end.
    ///
    /// The order only makes local iteration reproducible. It must not be used
    /// to resolve conflicts between peers: whoever chooses the digests can
    /// influence it.
    pub fn topological_sort(&self) -> GraphResult<Vec<K>, K> {
        let nodes = self.nodes.read().expect("graph lock poisoned");
        check(&nodes)?;

        let parents: HashMap<&K, Vec<&K>> = nodes
            .iter()
            .map(|(key, node)| (key, distinct(&node.parents)))
            .collect();

        let mut in_degree: HashMap<&K, usize> = nodes.keys().map(|k| (k, 0)).collect();
        for list in parents.values() {
            for parent in list {
                if let Some(deg) = in_degree.get_mut(*parent) {
                    *deg += 1;
                }
            }
        }

        let depth = ancestor_counts(&parents);
        let mut votes: HashMap<&K, usize> = HashMap::with_capacity(nodes.len());

        let mut ready: BinaryHeap<Ready<'_, K>> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(key, _)| Ready {
                ancestors: depth[key],
                votes: 0,
                key: *key,
            })
            .collect();

        let mut order: Vec<K> = Vec::with_capacity(nodes.len());
        while let Some(next) = ready.pop() {
            order.push(next.key.clone());
            for parent in &parents[next.key] {
                let vote = votes.entry(*parent).or_insert(0);
                *vote += 1;
                let Some(deg) = in_degree.get_mut(*parent) else {
                    continue;
                };
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Ready {
                        ancestors: depth[parent],
                        votes: *vote,
                        key: *parent,
                    });
                }
            }
        }

        if order.len() != nodes.len() {
            // Only reachable if `check` missed a cycle.
            let emitted: HashSet<&K> = order.iter().collect();
            let stuck = nodes
                .keys()
                .filter(|k| !emitted.contains(k))
                .min()
                .cloned();
            if let Some(key) = stuck {
                return Err(GraphError::Cycle(key));
            }
        }

        order.reverse();
        debug!(nodes = order.len(), "topologically sorted graph");
        Ok(order)
    }
}

impl<K, V> fmt::Debug for Graph<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.nodes.read().map(|n| n.len()).unwrap_or_default();
        f.debug_struct("Graph").field("node_count", &count).finish()
    }
}

/// A ready node in the sort frontier. The heap maximum is emitted next.
///
/// Priority never changes once a node is ready: all of its descendants have
/// already voted.
struct Ready<'a, K> {
    ancestors: usize,
    votes: usize,
    key: &'a K,
}

impl<K: Ord> Ord for Ready<'_, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ancestors
            .cmp(&self.ancestors)
            .then_with(|| self.votes.cmp(&other.votes))
            .then_with(|| self.key.cmp(other.key))
    }
}

impl<K: Ord> PartialOrd for Ready<'_, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> PartialEq for Ready<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord> Eq for Ready<'_, K> {}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

fn check<K, V>(nodes: &HashMap<K, Node<K, V>>) -> GraphResult<(), K>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
{
    let mut roots: Vec<K> = nodes
        .values()
        .filter(|n| n.is_root())
        .map(|n| n.key.clone())
        .collect();
    if roots.len() > 1 {
        roots.sort();
        return Err(GraphError::MultipleRoots(roots));
    }

    let mut keys: Vec<&K> = nodes.keys().collect();
    keys.sort();

    for key in &keys {
        for parent in &nodes[*key].parents {
            if !nodes.contains_key(parent) {
                return Err(GraphError::MissingParent {
                    node: (*key).clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    // Iterative DFS along parent edges; a parent still in progress closes a cycle.
    let mut state: HashMap<&K, Visit> = HashMap::with_capacity(nodes.len());
    for start in keys {
        if state.contains_key(start) {
            continue;
        }
        state.insert(start, Visit::InProgress);
        let mut stack: Vec<(&K, usize)> = vec![(start, 0)];

        while let Some(top) = stack.last_mut() {
            let key = top.0;
            let node_parents = &nodes[key].parents;
            if top.1 < node_parents.len() {
                let parent = &node_parents[top.1];
                top.1 += 1;
                match state.get(parent) {
                    Some(Visit::InProgress) => return Err(GraphError::Cycle(parent.clone())),
                    Some(Visit::Done) => {}
                    None => {
                        state.insert(parent, Visit::InProgress);
                        stack.push((parent, 0));
                    }
                }
            } else {
                state.insert(key, Visit::Done);
                stack.pop();
            }
        }
    }

    Ok(())
}

fn distinct<K: Eq + Hash>(keys: &[K]) -> Vec<&K> {
    let mut seen = HashSet::new();
    keys.iter().filter(|k| seen.insert(*k)).collect()
}

/// Number of distinct ancestors of every node.
fn ancestor_counts<'a, K: Eq + Hash>(parents: &HashMap<&'a K, Vec<&'a K>>) -> HashMap<&'a K, usize> {
    parents
        .keys()
        .map(|start| {
            let mut visited: HashSet<&K> = HashSet::new();
            let mut queue: VecDeque<&K> = parents[start].iter().copied().collect();
            while let Some(current) = queue.pop_front() {
                if visited.insert(current) {
                    if let Some(next) = parents.get(current) {
                        queue.extend(next.iter().copied());
                    }
                }
            }
            (*start, visited.len())
        })
        .collect()
}
