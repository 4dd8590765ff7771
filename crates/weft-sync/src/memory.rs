//! In-process network and resolver.
//!
//! [`MemoryHub`] plays the role of the wire: every [`MemoryNetwork`]
//! endpoint registers its router with the hub, and sending a message means
//! framing it with [`WeftCodec`], looking up the recipient's router, decoding
//! the frame and fanning the envelope out to matching subscribers. Used for
//! tests and for embedding several peers in one process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;
use weft_protocol::{WeftCodec, WeftMessage};
use weft_types::{Digest, PeerId};

use crate::error::{SyncError, SyncResult};
use crate::transport::{Envelope, MessageFilter, Network, Resolver, Subscription};

/// Internal subscriber: a filter paired with a broadcast sender.
struct Subscriber {
    filter: MessageFilter,
    sender: broadcast::Sender<Envelope>,
}

/// Fan-out router that delivers envelopes to matching subscribers.
struct MessageRouter {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl MessageRouter {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn subscribe(&self, filter: MessageFilter, capacity: usize) -> Subscription {
        let (tx, rx) = broadcast::channel(capacity);
        self.subscribers
            .write()
            .expect("router lock poisoned")
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Route an envelope to all matching subscribers and return how many
    /// received it. Subscribers whose receivers are gone are pruned.
    fn route(&self, envelope: &Envelope) -> usize {
        let mut delivered = 0;
        let mut subs = self.subscribers.write().expect("router lock poisoned");
        subs.retain(|sub| {
            if sub.filter.matches(envelope) {
                let ok = sub.sender.send(envelope.clone()).is_ok();
                if ok {
                    delivered += 1;
                }
                ok
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        delivered
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("router lock poisoned").len()
    }
}

/// Registry of in-process peers.
pub struct MemoryHub {
    peers: RwLock<HashMap<PeerId, Arc<MessageRouter>>>,
    channel_capacity: usize,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(1024)
    }

    /// Hub whose subscriptions buffer up to `channel_capacity` messages.
    pub fn with_capacity(channel_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            peers: RwLock::new(HashMap::new()),
            channel_capacity,
        })
    }

    /// Register a peer and return its network endpoint.
    ///
    /// Connecting an already registered peer replaces its router; earlier
    /// subscriptions of that peer stop receiving messages.
    pub fn connect(self: &Arc<Self>, peer: impl Into<PeerId>) -> MemoryNetwork {
        let local = peer.into();
        let router = Arc::new(MessageRouter::new());
        self.peers
            .write()
            .expect("hub lock poisoned")
            .insert(local.clone(), Arc::clone(&router));
        MemoryNetwork {
            local,
            hub: Arc::clone(self),
            router,
        }
    }

    /// Remove a peer; messages sent to it fail with `UnknownPeer`.
    pub fn disconnect(&self, peer: &PeerId) -> bool {
        self.peers
            .write()
            .expect("hub lock poisoned")
            .remove(peer)
            .is_some()
    }

    /// Registered peers, sorted.
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .peers
            .read()
            .expect("hub lock poisoned")
            .keys()
            .cloned()
            .collect();
        peers.sort();
        peers
    }

    fn router(&self, peer: &PeerId) -> Option<Arc<MessageRouter>> {
        self.peers
            .read()
            .expect("hub lock poisoned")
            .get(peer)
            .cloned()
    }
}

/// One peer's endpoint on a [`MemoryHub`].
pub struct MemoryNetwork {
    local: PeerId,
    hub: Arc<MemoryHub>,
    router: Arc<MessageRouter>,
}

impl MemoryNetwork {
    /// Number of live subscriptions on this endpoint.
    pub fn subscriber_count(&self) -> usize {
        self.router.subscriber_count()
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    fn local_peer(&self) -> PeerId {
        self.local.clone()
    }

    async fn send(&self, message: WeftMessage, recipient: &PeerId) -> SyncResult<()> {
        let frame = WeftCodec::encode(&message)?;
        let router = self
            .hub
            .router(recipient)
            .ok_or_else(|| SyncError::UnknownPeer(recipient.clone()))?;

        let (message, _) = WeftCodec::decode(&frame)?;
        let kind = message.type_name();
        let delivered = router.route(&Envelope {
            sender: self.local.clone(),
            message,
        });
        trace!(
            from = %self.local,
            to = %recipient,
            kind,
            bytes = frame.len(),
            delivered,
            "delivered message"
        );
        Ok(())
    }

    fn subscribe(&self, filter: MessageFilter) -> Subscription {
        self.router.subscribe(filter, self.hub.channel_capacity)
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("local", &self.local)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Static content-to-provider table.
#[derive(Default)]
pub struct MemoryResolver {
    providers: RwLock<HashMap<Digest, Vec<PeerId>>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `peer` provides `digest`. Duplicates are ignored.
    pub fn add_provider(&self, digest: Digest, peer: impl Into<PeerId>) {
        let peer = peer.into();
        let mut map = self.providers.write().expect("resolver lock poisoned");
        let list = map.entry(digest).or_default();
        if !list.contains(&peer) {
            list.push(peer);
        }
    }

    pub fn remove_provider(&self, digest: &Digest, peer: &PeerId) {
        let mut map = self.providers.write().expect("resolver lock poisoned");
        if let Some(list) = map.get_mut(digest) {
            list.retain(|p| p != peer);
        }
    }
}

#[async_trait]
impl Resolver for MemoryResolver {
    async fn lookup_by_content(&self, digest: &Digest) -> SyncResult<Vec<PeerId>> {
        Ok(self
            .providers
            .read()
            .expect("resolver lock poisoned")
            .get(digest)
            .cloned()
            .unwrap_or_default())
    }
}
