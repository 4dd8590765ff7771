use std::collections::HashMap;
use std::sync::RwLock;

use tracing::trace;
use weft_crypto::object_digest;
use weft_types::{Digest, Object};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access. Objects are cloned on read/write.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<Digest, Object>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, object: &Object) -> StoreResult<Digest> {
        let digest = object_digest(object)?;
        if digest.is_empty() {
            return Err(StoreError::EmptyDigest);
        }
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(digest).or_insert_with(|| object.clone());
        trace!(digest = %digest.short_hex(), "stored object");
        Ok(digest)
    }

    fn get(&self, digest: &Digest) -> StoreResult<Option<Object>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(digest).cloned())
    }

    fn exists(&self, digest: &Digest) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(digest))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
