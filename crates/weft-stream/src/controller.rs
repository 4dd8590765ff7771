//! The per-stream state machine.
//!
//! A controller starts unrooted. The first applied object without a root
//! reference becomes the stream root; from then on every object must belong
//! to that root. Objects without explicit parents attach to the current
//! leaves of the graph, and objects without a sequence number get one derived
//! from their ancestry.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use weft_crypto::object_digest;
use weft_dag::Graph;
use weft_store::ObjectStore;
use weft_types::{Digest, IntoObject, Metadata, Object, Parents};

use crate::error::{StreamError, StreamResult};
use crate::info::{ObjectInfo, StreamInfo};

/// Single-writer controller for one stream.
///
/// `apply` calls are serialized by the controller's mutex. The graph has its
/// own lock, so readers of the graph never wait on a whole `apply`.
pub struct StreamController {
    graph: Graph<Digest, Metadata>,
    state: Mutex<StreamInfo>,
    /// Last computed topological order. The graph only grows, so the order is
    /// current exactly when it covers every node.
    listing: Mutex<Vec<Digest>>,
    store: Arc<dyn ObjectStore>,
}

impl StreamController {
    /// Create an unrooted controller persisting into `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            graph: Graph::new(),
            state: Mutex::new(StreamInfo::default()),
            listing: Mutex::new(Vec::new()),
            store,
        }
    }

    /// Create a controller and apply `root` as its root object.
    pub fn with_root(store: Arc<dyn ObjectStore>, root: impl IntoObject) -> StreamResult<Self> {
        let controller = Self::new(store);
        controller.apply(root)?;
        Ok(controller)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Apply an event to the stream and return the digest it was stored under.
    ///
    /// Fails without touching the stream if the event has an empty type or
    /// belongs to another root. Store failures are propagated as-is.
    pub fn apply<E: IntoObject>(&self, event: E) -> StreamResult<Digest> {
        let mut object = event.into_object()?;
        if object.object_type.is_empty() {
            return Err(StreamError::EmptyType);
        }

        let mut state = self.state.lock().expect("lock poisoned");

        if !state.is_rooted() {
            if object.is_root() {
                return self.apply_root(&mut state, object);
            }
            return Err(StreamError::RootMismatch {
                expected: Digest::empty(),
                actual: object.metadata.root,
            });
        }

        let root = state.root_digest;
        if object_digest(&object)? == root {
            // Re-applying the root leaves the graph unchanged.
            self.graph.add(root, object.metadata.clone(), Vec::new());
            return Ok(root);
        }

        if object.metadata.root.is_empty() {
            object.metadata.root = root;
        } else if object.metadata.root != root {
            warn!(
                stream = %root.short_hex(),
                actual = %object.metadata.root.short_hex(),
                "rejected object for a different stream"
            );
            return Err(StreamError::RootMismatch {
                expected: root,
                actual: object.metadata.root,
            });
        }

        if object.metadata.parents.is_empty() {
            object.metadata.parents = Parents::all(self.graph.leaves());
        }
        let parents = object.metadata.parents.flatten();

        if object.metadata.sequence == 0 {
            object.metadata.sequence = self.graph.ancestors(&parents).len() as u64;
        }

        let digest = self.store.put(&object)?;
        self.graph.add(digest, object.metadata.clone(), parents);
        state.objects.insert(digest, ObjectInfo::new(&object, digest));

        debug!(
            stream = %root.short_hex(),
            object = %digest.short_hex(),
            object_type = %object.object_type,
            sequence = object.metadata.sequence,
            "applied object"
        );
        Ok(digest)
    }

    fn apply_root(&self, state: &mut StreamInfo, object: Object) -> StreamResult<Digest> {
        let digest = self.store.put(&object)?;
        self.graph.add(digest, object.metadata.clone(), Vec::new());

        state.root_type = object.object_type.clone();
        state.root_digest = digest;
        state.objects.insert(digest, ObjectInfo::new(&object, digest));
        state.root_object = Some(object);

        debug!(stream = %digest.short_hex(), root_type = %state.root_type, "stream rooted");
        Ok(digest)
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    /// A snapshot of the stream description.
    pub fn stream_info(&self) -> StreamInfo {
        self.state.lock().expect("lock poisoned").clone()
    }

    /// The root digest, or `None` while unrooted.
    pub fn stream_root(&self) -> Option<Digest> {
        self.state.lock().expect("lock poisoned").root()
    }

    /// Returns `true` once the root object has been applied.
    pub fn is_rooted(&self) -> bool {
        self.state.lock().expect("lock poisoned").is_rooted()
    }

    /// Descriptive state of one applied object.
    pub fn object_info(&self, digest: &Digest) -> Option<ObjectInfo> {
        self.state
            .lock()
            .expect("lock poisoned")
            .objects
            .get(digest)
            .cloned()
    }

    /// Every known digest in deterministic root-first order.
    ///
    /// The sort is cached and only recomputed after the graph has grown.
    pub fn object_digests(&self) -> StreamResult<Vec<Digest>> {
        {
            let cached = self.listing.lock().expect("lock poisoned");
            if !cached.is_empty() && cached.len() == self.graph.len() {
                return Ok(cached.clone());
            }
        }

        let order = self.graph.topological_sort()?;
        let mut cached = self.listing.lock().expect("lock poisoned");
        if order.len() > cached.len() {
            *cached = order.clone();
        }
        Ok(order)
    }

    /// Snapshot of the set of known digests.
    pub fn known_digests(&self) -> HashSet<Digest> {
        self.graph.keys().into_iter().collect()
    }

    /// Current frontier of the stream, sorted ascending.
    pub fn leaves(&self) -> Vec<Digest> {
        self.graph.leaves()
    }

    /// Returns `true` if the object is part of the stream graph.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.graph.contains(digest)
    }

    /// Check the structural integrity of the stream graph.
    pub fn verify(&self) -> StreamResult<()> {
        Ok(self.graph.verify()?)
    }

    /// Number of objects in the stream graph.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Returns `true` if nothing has been applied yet.
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// The store objects are persisted into.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("root", &self.stream_root())
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_store::{InMemoryObjectStore, StoreError, StoreResult};
    use weft_types::TypeResult;

    fn store() -> Arc<InMemoryObjectStore> {
        Arc::new(InMemoryObjectStore::new())
    }

    fn controller() -> (StreamController, Arc<InMemoryObjectStore>) {
        let store = store();
        (StreamController::new(store.clone()), store)
    }

    fn root_object() -> Object {
        Object::new("stream:test", b"root".to_vec())
    }

    fn event(body: &str) -> Object {
        Object::new("test:event", body.as_bytes().to_vec())
    }

    /// A store that refuses every write.
    struct ReadOnlyStore;

    impl ObjectStore for ReadOnlyStore {
        fn put(&self, _object: &Object) -> StoreResult<Digest> {
            Err(StoreError::Unavailable("read-only".into()))
        }

        fn get(&self, _digest: &Digest) -> StoreResult<Option<Object>> {
            Ok(None)
        }
    }

    // ----------------------------------------------------------
    // Rooting
    // ----------------------------------------------------------

    #[test]
    fn first_apply_becomes_root() {
        let (ctrl, store) = controller();
        assert!(!ctrl.is_rooted());
        assert_eq!(ctrl.stream_root(), None);

        let root = ctrl.apply(root_object()).unwrap();
        assert!(ctrl.is_rooted());
        assert_eq!(ctrl.stream_root(), Some(root));
        assert_eq!(root, object_digest(&root_object()).unwrap());

        let info = ctrl.stream_info();
        assert_eq!(info.root_type, "stream:test");
        assert_eq!(info.root_digest, root);
        assert_eq!(info.root_object, Some(root_object()));
        assert!(info.objects.contains_key(&root));
        assert!(store.exists(&root).unwrap());
        assert_eq!(ctrl.object_digests().unwrap(), vec![root]);
    }

    #[test]
    fn unrooted_controller_rejects_non_root_object() {
        let (ctrl, _) = controller();
        let other = Digest::from_bytes(b"elsewhere");
        let err = ctrl.apply(event("a").with_root(other)).unwrap_err();
        assert!(matches!(err, StreamError::RootMismatch { actual, .. } if actual == other));
        assert!(ctrl.is_empty());
    }

    #[test]
    fn reapplying_root_is_idempotent() {
        let (ctrl, _) = controller();
        let root = ctrl.apply(root_object()).unwrap();
        let a = ctrl.apply(event("a")).unwrap();

        assert_eq!(ctrl.apply(root_object()).unwrap(), root);
        assert_eq!(ctrl.len(), 2);
        assert_eq!(ctrl.leaves(), vec![a]);
        ctrl.verify().unwrap();
    }

    #[test]
    fn reapplying_event_is_idempotent() {
        let (ctrl, store) = controller();
        ctrl.apply(root_object()).unwrap();
        let a = ctrl.apply(event("a")).unwrap();
        let stored = store.get(&a).unwrap().unwrap();

        assert_eq!(ctrl.apply(stored).unwrap(), a);
        assert_eq!(ctrl.len(), 2);
        assert_eq!(store.len(), 2);
    }

    // ----------------------------------------------------------
    // Validation
    // ----------------------------------------------------------

    #[test]
    fn empty_type_is_rejected() {
        let (ctrl, _) = controller();
        let err = ctrl.apply(Object::new("", vec![])).unwrap_err();
        assert!(matches!(err, StreamError::EmptyType));
        assert!(!ctrl.is_rooted());
    }

    #[test]
    fn root_mismatch_leaves_state_untouched() {
        let (ctrl, store) = controller();
        let root = ctrl.apply(root_object()).unwrap();
        let foreign = Digest::from_bytes(b"another stream");

        let err = ctrl.apply(event("x").with_root(foreign)).unwrap_err();
        match err {
            StreamError::RootMismatch { expected, actual } => {
                assert_eq!(expected, root);
                assert_eq!(actual, foreign);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctrl.len(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(ctrl.stream_info().objects.len(), 1);
    }

    #[test]
    fn store_failure_propagates() {
        let ctrl = StreamController::new(Arc::new(ReadOnlyStore));
        let err = ctrl.apply(root_object()).unwrap_err();
        assert!(matches!(err, StreamError::Store(StoreError::Unavailable(_))));
        assert!(!ctrl.is_rooted());
        assert!(ctrl.is_empty());
    }

    #[test]
    fn conversion_failure_propagates() {
        struct Broken;
        impl IntoObject for Broken {
            fn into_object(self) -> TypeResult<Object> {
                Err(weft_types::TypeError::Serialization("boom".into()))
            }
        }
        let (ctrl, _) = controller();
        assert!(matches!(ctrl.apply(Broken), Err(StreamError::Conversion(_))));
    }

    // ----------------------------------------------------------
    // Defaults
    // ----------------------------------------------------------

    #[test]
    fn defaults_root_and_parents() {
        let (ctrl, store) = controller();
        let root = ctrl.apply(root_object()).unwrap();
        let a = ctrl.apply(event("a")).unwrap();

        let stored = store.get(&a).unwrap().unwrap();
        assert_eq!(stored.metadata.root, root);
        assert_eq!(stored.metadata.parents, Parents::all(vec![root]));
        assert_eq!(stored.metadata.sequence, 1);

        let info = ctrl.object_info(&a).unwrap();
        assert_eq!(info.metadata, stored.metadata);
    }

    #[test]
    fn explicit_parents_are_kept() {
        let (ctrl, store) = controller();
        let root = ctrl.apply(root_object()).unwrap();
        let a = ctrl.apply(event("a")).unwrap();
        let _b = ctrl.apply(event("b")).unwrap();

        let c = ctrl
            .apply(event("c").with_parents(Parents::all(vec![a])))
            .unwrap();
        let stored = store.get(&c).unwrap().unwrap();
        assert_eq!(stored.metadata.parents, Parents::all(vec![a]));
        assert_eq!(stored.metadata.root, root);
        // a and root
        assert_eq!(stored.metadata.sequence, 2);
    }

    #[test]
    fn sequence_counts_distinct_ancestors() {
        let (ctrl, store) = controller();
        ctrl.apply(root_object()).unwrap();
        let a = ctrl.apply(event("a")).unwrap();
        let b = ctrl
            .apply(event("b").with_parents(Parents::all(vec![a])))
            .unwrap();
        let c = ctrl
            .apply(event("c").with_parents(Parents::all(vec![a])))
            .unwrap();
        // Merge of b and c: b, c, a, root.
        let d = ctrl.apply(event("d")).unwrap();

        let seq = |digest: &Digest| store.get(digest).unwrap().unwrap().metadata.sequence;
        assert_eq!(seq(&b), 2);
        assert_eq!(seq(&c), 2);
        assert_eq!(seq(&d), 4);
        assert_eq!(ctrl.leaves(), vec![d]);
    }

    #[test]
    fn explicit_sequence_is_kept() {
        let (ctrl, store) = controller();
        ctrl.apply(root_object()).unwrap();
        let a = ctrl.apply(event("a").with_sequence(42)).unwrap();
        assert_eq!(store.get(&a).unwrap().unwrap().metadata.sequence, 42);
    }

    #[test]
    fn events_attach_to_current_frontier() {
        // root -> A; B (no parents) attaches to [A]; C explicitly to [A];
        // D (no parents) attaches to the leaves [B, C].
        let (ctrl, store) = controller();
        ctrl.apply(root_object()).unwrap();
        let a = ctrl.apply(event("A")).unwrap();
        let b = ctrl.apply(event("B")).unwrap();
        assert_eq!(
            store.get(&b).unwrap().unwrap().metadata.parents,
            Parents::all(vec![a])
        );

        let c = ctrl
            .apply(event("C").with_parents(Parents::all(vec![a])))
            .unwrap();
        let mut frontier = vec![b, c];
        frontier.sort();
        assert_eq!(ctrl.leaves(), frontier);

        let d = ctrl.apply(event("D")).unwrap();
        assert_eq!(
            store.get(&d).unwrap().unwrap().metadata.parents,
            Parents::all(frontier)
        );
        assert_eq!(ctrl.leaves(), vec![d]);

        let order = ctrl.object_digests().unwrap();
        assert_eq!(order.len(), 5);
        assert_eq!(order[0], ctrl.stream_root().unwrap());
        assert_eq!(order[4], d);
        ctrl.verify().unwrap();
    }

    #[test]
    fn listing_tracks_applies() {
        let (ctrl, _) = controller();
        assert!(ctrl.object_digests().unwrap().is_empty());

        let root = ctrl.apply(root_object()).unwrap();
        let a = ctrl.apply(event("A")).unwrap();
        let first = ctrl.object_digests().unwrap();
        assert_eq!(first, vec![root, a]);
        assert_eq!(ctrl.object_digests().unwrap(), first);

        // Idempotent re-applies keep the same listing.
        ctrl.apply(root_object()).unwrap();
        assert_eq!(ctrl.object_digests().unwrap(), first);

        let b = ctrl.apply(event("B")).unwrap();
        assert_eq!(ctrl.object_digests().unwrap(), vec![root, a, b]);
    }

    #[test]
    fn with_root_constructor() {
        let ctrl = StreamController::with_root(store(), root_object()).unwrap();
        assert!(ctrl.is_rooted());
        assert_eq!(ctrl.known_digests().len(), 1);
    }

    // ----------------------------------------------------------
    // Concurrency
    // ----------------------------------------------------------

    #[test]
    fn concurrent_applies_keep_graph_valid() {
        use std::thread;

        let (ctrl, store) = controller();
        ctrl.apply(root_object()).unwrap();
        let ctrl = Arc::new(ctrl);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ctrl = Arc::clone(&ctrl);
                thread::spawn(move || {
                    for i in 0..25 {
                        ctrl.apply(event(&format!("{t}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }

        assert_eq!(ctrl.len(), 201);
        assert_eq!(store.len(), 201);
        ctrl.verify().unwrap();
        assert_eq!(ctrl.object_digests().unwrap().len(), 201);
    }
}
