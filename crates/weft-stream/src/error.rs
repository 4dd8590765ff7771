use weft_types::Digest;

/// Errors produced by stream controllers.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("object type must not be empty")]
    EmptyType,

    #[error("roots don't match: expected {expected}, got {actual}")]
    RootMismatch { expected: Digest, actual: Digest },

    #[error("graph error: {0}")]
    Graph(#[from] weft_dag::GraphError<Digest>),

    #[error("store error: {0}")]
    Store(#[from] weft_store::StoreError),

    #[error("hashing error: {0}")]
    Hashing(#[from] weft_crypto::HasherError),

    #[error("conversion error: {0}")]
    Conversion(#[from] weft_types::TypeError),
}

pub type StreamResult<T> = Result<T, StreamError>;
