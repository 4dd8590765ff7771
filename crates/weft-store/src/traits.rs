use weft_types::{Digest, Object};

use crate::error::StoreResult;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - The key of an object is its canonical digest; the store computes it.
/// - `put` is idempotent.
/// - Concurrent reads are always safe.
pub trait ObjectStore: Send + Sync {
    /// Persist an object and return its digest.
    fn put(&self, object: &Object) -> StoreResult<Digest>;

    /// Read an object by digest. Returns `Ok(None)` if it does not exist.
    fn get(&self, digest: &Digest) -> StoreResult<Option<Object>>;

    /// Check whether an object exists in the store.
    fn exists(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.get(digest)?.is_some())
    }
}
