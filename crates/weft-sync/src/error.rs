use thiserror::Error;
use weft_types::{Digest, PeerId};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("roots don't match: expected {expected}, got {actual}")]
    RootMismatch { expected: Digest, actual: Digest },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request {request_id} to {peer} timed out after {timeout_ms} ms")]
    Timeout {
        peer: PeerId,
        request_id: String,
        timeout_ms: u64,
    },

    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("unexpected message from {peer}: {kind}")]
    UnexpectedMessage { peer: PeerId, kind: &'static str },

    #[error("digest mismatch: requested {requested}, received {received}")]
    DigestMismatch { requested: Digest, received: Digest },

    #[error("object {digest} unavailable from {peer}")]
    ObjectUnavailable { digest: Digest, peer: PeerId },

    #[error("stream error: {0}")]
    Stream(#[from] weft_stream::StreamError),

    #[error("protocol error: {0}")]
    Protocol(#[from] weft_protocol::ProtocolError),

    #[error("hashing error: {0}")]
    Hashing(#[from] weft_crypto::HasherError),

    #[error("config error: {0}")]
    Config(String),

    #[error("{} sync errors: {}", .0.len(), join(.0))]
    Aggregate(Vec<SyncError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join(errors: &[SyncError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SyncError {
    /// Store failures are not retried or aggregated; they end the operation.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Stream(weft_stream::StreamError::Store(_)))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_lists_every_error() {
        let err = SyncError::Aggregate(vec![
            SyncError::Transport("down".into()),
            SyncError::UnknownPeer(PeerId::new("ghost")),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 sync errors"));
        assert!(msg.contains("down"));
        assert!(msg.contains("ghost"));
    }

    #[test]
    fn store_failures_are_classified() {
        let store = SyncError::Stream(weft_stream::StreamError::Store(
            weft_store::StoreError::Unavailable("disk".into()),
        ));
        assert!(store.is_store_failure());
        assert!(!SyncError::Transport("x".into()).is_store_failure());
    }
}
