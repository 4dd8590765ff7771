use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;
use weft_store::ObjectStore;
use weft_types::{Digest, IntoObject};

use crate::controller::StreamController;
use crate::error::StreamResult;

/// Registry of the stream controllers a node participates in, keyed by
/// stream root digest. All controllers share one object store.
pub struct StreamManager {
    store: Arc<dyn ObjectStore>,
    streams: RwLock<HashMap<Digest, Arc<StreamController>>>,
}

impl StreamManager {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// The shared object store.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// The controller for a stream, if one is registered.
    pub fn get(&self, root: &Digest) -> Option<Arc<StreamController>> {
        self.streams
            .read()
            .expect("lock poisoned")
            .get(root)
            .cloned()
    }

    /// The controller for a stream, registering an unrooted one if needed.
    pub fn get_or_create(&self, root: Digest) -> Arc<StreamController> {
        let mut streams = self.streams.write().expect("lock poisoned");
        Arc::clone(streams.entry(root).or_insert_with(|| {
            debug!(stream = %root.short_hex(), "registered stream");
            Arc::new(StreamController::new(Arc::clone(&self.store)))
        }))
    }

    /// Register a controller under `root`, replacing any previous one.
    pub fn insert(&self, root: Digest, controller: Arc<StreamController>) {
        self.streams
            .write()
            .expect("lock poisoned")
            .insert(root, controller);
    }

    /// Start a new stream from a root object and register its controller.
    pub fn create_stream(&self, root: impl IntoObject) -> StreamResult<Arc<StreamController>> {
        let controller = StreamController::new(Arc::clone(&self.store));
        let digest = controller.apply(root)?;

        let mut streams = self.streams.write().expect("lock poisoned");
        let controller = Arc::clone(streams.entry(digest).or_insert_with(|| Arc::new(controller)));
        debug!(stream = %digest.short_hex(), "created stream");
        Ok(controller)
    }

    /// Roots of all registered streams, sorted.
    pub fn streams(&self) -> Vec<Digest> {
        let mut roots: Vec<Digest> = self
            .streams
            .read()
            .expect("lock poisoned")
            .keys()
            .copied()
            .collect();
        roots.sort();
        roots
    }

    pub fn len(&self) -> usize {
        self.streams.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_store::InMemoryObjectStore;
    use weft_types::Object;

    fn manager() -> StreamManager {
        StreamManager::new(Arc::new(InMemoryObjectStore::new()))
    }

    #[test]
    fn create_and_get() {
        let mgr = manager();
        let ctrl = mgr.create_stream(Object::new("stream:chat", vec![])).unwrap();
        let root = ctrl.stream_root().unwrap();

        let found = mgr.get(&root).unwrap();
        assert!(Arc::ptr_eq(&ctrl, &found));
        assert_eq!(mgr.streams(), vec![root]);
        assert!(mgr.store().exists(&root).unwrap());
    }

    #[test]
    fn creating_an_existing_stream_returns_the_registered_controller() {
        let mgr = manager();
        let first = mgr.create_stream(Object::new("stream:chat", vec![])).unwrap();
        first.apply(Object::new("chat:msg", b"hi".to_vec())).unwrap();

        let second = mgr.create_stream(Object::new("stream:chat", vec![])).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 2);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn get_or_create_registers_unrooted_controller() {
        let mgr = manager();
        let root = Digest::from_bytes(b"remote stream");
        assert!(mgr.get(&root).is_none());

        let a = mgr.get_or_create(root);
        let b = mgr.get_or_create(root);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_rooted());
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn insert_replaces() {
        let mgr = manager();
        let root = Digest::from_bytes(b"s");
        let a = mgr.get_or_create(root);
        let replacement = Arc::new(StreamController::new(Arc::clone(mgr.store())));
        mgr.insert(root, Arc::clone(&replacement));
        assert!(!Arc::ptr_eq(&a, &mgr.get(&root).unwrap()));
        assert!(mgr.get(&root).is_some_and(|c| Arc::ptr_eq(&c, &replacement)));
    }
}
