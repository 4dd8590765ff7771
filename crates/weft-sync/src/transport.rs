use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use weft_protocol::{MessageKind, WeftMessage};
use weft_types::{Digest, PeerId};

use crate::error::{SyncError, SyncResult};

/// A message together with the peer that sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub sender: PeerId,
    pub message: WeftMessage,
}

/// Filter for subscribing to a subset of incoming messages.
#[derive(Clone, Debug, Default)]
pub struct MessageFilter {
    /// If set, only messages of these kinds are delivered.
    pub kinds: Option<Vec<MessageKind>>,
    /// If set, only messages from this peer are delivered.
    pub sender: Option<PeerId>,
    /// If set, only messages carrying this correlation id are delivered.
    pub request_id: Option<String>,
}

impl MessageFilter {
    /// Deliver everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Deliver only messages of one kind.
    pub fn kind(kind: MessageKind) -> Self {
        Self {
            kinds: Some(vec![kind]),
            ..Self::default()
        }
    }

    /// Deliver only the reply of `kind` from `sender` to `request_id`.
    pub fn reply(sender: PeerId, kind: MessageKind, request_id: impl Into<String>) -> Self {
        Self {
            kinds: Some(vec![kind]),
            sender: Some(sender),
            request_id: Some(request_id.into()),
        }
    }

    /// Returns `true` if the given envelope matches this filter.
    pub fn matches(&self, envelope: &Envelope) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&envelope.message.kind()) {
                return false;
            }
        }
        if let Some(ref sender) = self.sender {
            if *sender != envelope.sender {
                return false;
            }
        }
        if let Some(ref id) = self.request_id {
            if envelope.message.request_id() != Some(id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for incoming messages.
pub type Subscription = broadcast::Receiver<Envelope>;

/// Message transport between peers.
///
/// Implementations deliver each incoming message to every subscription
/// whose filter matches it.
#[async_trait]
pub trait Network: Send + Sync {
    /// Address of this node.
    fn local_peer(&self) -> PeerId;

    /// Deliver a message to one peer.
    async fn send(&self, message: WeftMessage, recipient: &PeerId) -> SyncResult<()>;

    /// Receive incoming messages matching `filter`.
    fn subscribe(&self, filter: MessageFilter) -> Subscription;

    /// Send a request and wait for the reply of kind `expected` carrying the
    /// same request id from the same peer.
    ///
    /// The reply subscription is registered before sending, so a fast reply
    /// cannot be missed.
    async fn send_with_response(
        &self,
        message: WeftMessage,
        recipient: &PeerId,
        expected: MessageKind,
        timeout: Duration,
    ) -> SyncResult<WeftMessage> {
        let request_id = message
            .request_id()
            .ok_or_else(|| {
                SyncError::Transport(format!("{} carries no request id", message.type_name()))
            })?
            .to_string();
        let mut replies = self.subscribe(MessageFilter::reply(
            recipient.clone(),
            expected,
            request_id.clone(),
        ));

        self.send(message, recipient).await?;

        let wait = async {
            loop {
                match replies.recv().await {
                    Ok(envelope) => return Ok(envelope.message),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(SyncError::Transport("reply channel closed".into()))
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SyncError::Timeout {
                peer: recipient.clone(),
                request_id,
                timeout_ms: timeout.as_millis() as u64,
            })?
    }
}

/// Content-based peer lookup.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Peers believed to hold the object (or stream) with this digest.
    async fn lookup_by_content(&self, digest: &Digest) -> SyncResult<Vec<PeerId>>;
}
