use weft_types::{Digest, Object};

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag (`"weft-object-v1"`) is prepended to every hash
/// computation, so object digests never collide with plain BLAKE3 hashes of
/// the same bytes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for stream objects.
    pub const OBJECT: Self = Self {
        domain: "weft-object-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Digest, HasherError> {
        let data = serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }
}

/// The canonical digest of an object.
///
/// Covers the type tag, the full metadata (root, parents, sequence) and the
/// payload. Struct fields serialize in declaration order and parent groups
/// in label order, so the encoding is stable.
pub fn object_digest(object: &Object) -> Result<Digest, HasherError> {
    ContentHasher::OBJECT.hash_json(object)
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
