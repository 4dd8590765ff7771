/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The object hashed to the empty digest.
    #[error("cannot store object under the empty digest")]
    EmptyDigest,

    /// The object could not be hashed.
    #[error("hashing error: {0}")]
    Hashing(#[from] weft_crypto::HasherError),

    /// The backend is unavailable or read-only.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
