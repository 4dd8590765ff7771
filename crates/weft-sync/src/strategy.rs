//! Topographical synchronization.
//!
//! Peers compare streams by listing digests in topological order and then
//! requesting the objects they lack one at a time. There is no bulk graph
//! transfer: a requester skips what it already has, and a provider never has
//! to compute a subgraph on demand.
//!
//! # Serving
//!
//! [`TopographicalSync::serve`] answers three kinds of incoming messages:
//! `RequestLinear` (a page of a stream's digests), `ObjectRequest` (one
//! object body from the store) and `Announcement` (fetch the announced stream
//! if any of the announced objects are unknown).
//!
//! # Fetching
//!
//! [`TopographicalSync::fetch`] asks every provider the resolver knows for
//! the stream, one provider at a time, and applies whatever is missing.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use weft_crypto::object_digest;
use weft_protocol::{
    Announcement, LinearResponse, MessageKind, ObjectRequest, ObjectResponse, RequestLinear,
    WeftMessage,
};
use weft_stream::{StreamController, StreamManager};
use weft_types::{Digest, Object, PeerId};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{Envelope, MessageFilter, Network, Resolver, Subscription};
use crate::types::FetchResult;

/// Stream synchronization over a [`Network`] and a [`Resolver`].
pub struct TopographicalSync {
    network: Arc<dyn Network>,
    resolver: Arc<dyn Resolver>,
    config: SyncConfig,
}

/// Handle to the tasks started by [`TopographicalSync::serve`].
///
/// Dropping the handle leaves the tasks running.
pub struct SyncHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    /// Stop serving.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
    }

    /// Returns `true` once every serve task has ended.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }
}

impl TopographicalSync {
    pub fn new(network: Arc<dyn Network>, resolver: Arc<dyn Resolver>, config: SyncConfig) -> Self {
        Self {
            network,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn local_peer(&self) -> PeerId {
        self.network.local_peer()
    }

    // ---------------------------------------------------------------
    // Serving
    // ---------------------------------------------------------------

    /// Start answering requests for the streams in `manager`.
    ///
    /// Subscriptions are registered before this returns, so nothing sent
    /// afterwards is missed. Must be called inside a tokio runtime.
    pub fn serve(self: &Arc<Self>, manager: Arc<StreamManager>) -> SyncHandle {
        let requests = self
            .network
            .subscribe(MessageFilter::kind(MessageKind::RequestLinear));
        let objects = self
            .network
            .subscribe(MessageFilter::kind(MessageKind::ObjectRequest));
        let announcements = self
            .network
            .subscribe(MessageFilter::kind(MessageKind::Announcement));

        info!(peer = %self.local_peer(), "serving stream sync");
        let tasks = vec![
            tokio::spawn(Arc::clone(self).handle_requests(Arc::clone(&manager), requests)),
            tokio::spawn(Arc::clone(self).handle_object_requests(Arc::clone(&manager), objects)),
            tokio::spawn(Arc::clone(self).handle_announcements(manager, announcements)),
        ];
        SyncHandle { tasks }
    }

    async fn handle_requests(self: Arc<Self>, manager: Arc<StreamManager>, mut rx: Subscription) {
        while let Some(envelope) = next_envelope(&mut rx, "linear requests").await {
            let WeftMessage::RequestLinear(request) = envelope.message else {
                continue;
            };
            let response = linear_response(&manager, &request);
            debug!(
                peer = %envelope.sender,
                stream = %request.root_hash.short_hex(),
                skip = request.skip,
                returned = response.leaves.len(),
                total = response.total,
                "answering linear request"
            );
            if let Err(e) = self.network.send(response.into(), &envelope.sender).await {
                warn!(peer = %envelope.sender, error = %e, "failed to answer linear request");
            }
        }
        debug!("linear request handler stopped");
    }

    async fn handle_object_requests(
        self: Arc<Self>,
        manager: Arc<StreamManager>,
        mut rx: Subscription,
    ) {
        while let Some(envelope) = next_envelope(&mut rx, "object requests").await {
            let WeftMessage::ObjectRequest(request) = envelope.message else {
                continue;
            };
            let object = match manager.store().get(&request.object_hash) {
                Ok(object) => object,
                Err(e) => {
                    warn!(object = %request.object_hash.short_hex(), error = %e, "store read failed");
                    None
                }
            };
            let response = ObjectResponse {
                request_id: request.request_id,
                object,
            };
            if let Err(e) = self.network.send(response.into(), &envelope.sender).await {
                warn!(peer = %envelope.sender, error = %e, "failed to answer object request");
            }
        }
        debug!("object request handler stopped");
    }

    async fn handle_announcements(self: Arc<Self>, manager: Arc<StreamManager>, mut rx: Subscription) {
        while let Some(envelope) = next_envelope(&mut rx, "announcements").await {
            let WeftMessage::Announcement(announcement) = envelope.message else {
                continue;
            };
            let stream = announcement.stream_hash;
            let controller = manager.get_or_create(stream);
            let missing = announcement
                .object_hashes
                .iter()
                .filter(|d| !controller.contains(d))
                .count();
            debug!(
                peer = %envelope.sender,
                stream = %stream.short_hex(),
                announced = announcement.object_hashes.len(),
                missing,
                "received announcement"
            );
            if missing == 0 || !self.config.fetch_on_announcement {
                continue;
            }

            // Always a full re-sync of the stream, not just the announced delta.
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                match this.fetch(&controller, stream).await {
                    Ok(result) if result.is_complete() => {
                        debug!(stream = %stream.short_hex(), fetched = result.fetched, "announcement sync done");
                    }
                    Ok(result) => {
                        warn!(
                            stream = %stream.short_hex(),
                            fetched = result.fetched,
                            errors = result.errors.len(),
                            "announcement sync incomplete"
                        );
                    }
                    Err(e) => warn!(stream = %stream.short_hex(), error = %e, "announcement sync failed"),
                }
            });
        }
        debug!("announcement handler stopped");
    }

    // ---------------------------------------------------------------
    // Announcing
    // ---------------------------------------------------------------

    /// Tell `recipients` that `digests` exist in the stream rooted at
    /// `stream_root`. Every recipient is tried; failures are combined.
    pub async fn announce(
        &self,
        stream_root: Digest,
        digests: Vec<Digest>,
        recipients: &[PeerId],
    ) -> SyncResult<()> {
        let message: WeftMessage = Announcement {
            stream_hash: stream_root,
            object_hashes: digests,
        }
        .into();

        let mut errors = Vec::new();
        for recipient in recipients {
            if let Err(e) = self.network.send(message.clone(), recipient).await {
                warn!(peer = %recipient, error = %e, "announcement not delivered");
                errors.push(e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Aggregate(errors))
        }
    }

    // ---------------------------------------------------------------
    // Fetching
    // ---------------------------------------------------------------

    /// Fetch every object of the stream rooted at `stream_root` that
    /// `controller` does not know yet.
    ///
    /// A controller rooted elsewhere is rejected outright. An unrooted
    /// controller is accepted; the root object is fetched first. Store
    /// failures abort the call; everything else is collected in the result.
    pub async fn fetch(
        &self,
        controller: &StreamController,
        stream_root: Digest,
    ) -> SyncResult<FetchResult> {
        if let Some(root) = controller.stream_root() {
            if root != stream_root {
                return Err(SyncError::RootMismatch {
                    expected: root,
                    actual: stream_root,
                });
            }
        }

        let mut known = controller.known_digests();
        let providers = self.resolver.lookup_by_content(&stream_root).await?;
        let local = self.local_peer();
        let mut result = FetchResult::default();

        for provider in providers.iter().filter(|p| **p != local) {
            result.providers_contacted += 1;
            if let Err(e) = self
                .fetch_from(controller, stream_root, provider, &mut known, &mut result)
                .await
            {
                if e.is_store_failure() {
                    return Err(e);
                }
                warn!(peer = %provider, stream = %stream_root.short_hex(), error = %e, "provider failed");
                result.errors.push(e);
            }
        }

        info!(
            stream = %stream_root.short_hex(),
            providers = result.providers_contacted,
            fetched = result.fetched,
            errors = result.errors.len(),
            "fetch finished"
        );
        Ok(result)
    }

    /// One provider's part of a fetch. An `Err` means the provider could not
    /// be listed; per-object failures go into `result.errors`.
    async fn fetch_from(
        &self,
        controller: &StreamController,
        stream_root: Digest,
        provider: &PeerId,
        known: &mut HashSet<Digest>,
        result: &mut FetchResult,
    ) -> SyncResult<()> {
        let listed = self.list_digests(provider, stream_root).await?;

        // Dedup is per provider. `known` only grows on a successful apply, so
        // a digest this provider lists but cannot deliver is requested again
        // from the next provider.
        let mut queued = HashSet::new();
        let mut missing: Vec<Digest> = listed
            .into_iter()
            .filter(|d| !known.contains(d) && queued.insert(*d))
            .collect();

        if missing.is_empty() {
            debug!(peer = %provider, stream = %stream_root.short_hex(), "nothing missing");
            return Ok(());
        }
        if !controller.is_rooted() && !known.contains(&stream_root) {
            missing.retain(|d| *d != stream_root);
            missing.insert(0, stream_root);
        }
        debug!(peer = %provider, stream = %stream_root.short_hex(), missing = missing.len(), "fetching objects");

        for digest in missing {
            let object = match self.fetch_object(provider, digest).await {
                Ok(object) => object,
                Err(e) => {
                    debug!(peer = %provider, object = %digest.short_hex(), error = %e, "object fetch failed");
                    result.errors.push(e);
                    continue;
                }
            };
            match controller.apply(object) {
                Ok(_) => {
                    known.insert(digest);
                    result.fetched += 1;
                }
                Err(e) => {
                    let e = SyncError::from(e);
                    if e.is_store_failure() {
                        return Err(e);
                    }
                    result.errors.push(e);
                }
            }
        }
        Ok(())
    }

    /// Page through a provider's digest listing of a stream.
    async fn list_digests(&self, provider: &PeerId, stream_root: Digest) -> SyncResult<Vec<Digest>> {
        let limit = self.config.page_limit;
        let mut skip = 0i64;
        let mut listed = Vec::new();

        loop {
            let request = RequestLinear::new(stream_root, limit, skip);
            let reply = self
                .network
                .send_with_response(
                    request.into(),
                    provider,
                    MessageKind::LinearResponse,
                    self.config.request_timeout(),
                )
                .await?;
            let WeftMessage::LinearResponse(page) = reply else {
                return Err(SyncError::UnexpectedMessage {
                    peer: provider.clone(),
                    kind: reply.type_name(),
                });
            };

            let received = page.leaves.len();
            listed.extend(page.leaves);
            if received == 0 || skip + limit >= page.total || listed.len() as i64 >= page.total {
                break;
            }
            skip += limit;
        }
        Ok(listed)
    }

    /// Request one object and check that it hashes to the requested digest.
    async fn fetch_object(&self, provider: &PeerId, digest: Digest) -> SyncResult<Object> {
        let reply = self
            .network
            .send_with_response(
                ObjectRequest::new(digest).into(),
                provider,
                MessageKind::ObjectResponse,
                self.config.request_timeout(),
            )
            .await?;
        let WeftMessage::ObjectResponse(response) = reply else {
            return Err(SyncError::UnexpectedMessage {
                peer: provider.clone(),
                kind: reply.type_name(),
            });
        };
        let object = response.object.ok_or_else(|| SyncError::ObjectUnavailable {
            digest,
            peer: provider.clone(),
        })?;

        let received = object_digest(&object)?;
        if received != digest {
            return Err(SyncError::DigestMismatch {
                requested: digest,
                received,
            });
        }
        Ok(object)
    }
}

/// Next envelope from a subscription; `None` once it is closed.
async fn next_envelope(rx: &mut Subscription, what: &str) -> Option<Envelope> {
    loop {
        match rx.recv().await {
            Ok(envelope) => return Some(envelope),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, handler = what, "subscription lagged, messages dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn linear_response(manager: &StreamManager, request: &RequestLinear) -> LinearResponse {
    let Some(controller) = manager.get(&request.root_hash) else {
        return LinearResponse::empty(request.request_id.clone(), request.root_hash);
    };
    match controller.object_digests() {
        Ok(digests) => LinearResponse::page(request, &digests),
        Err(e) => {
            warn!(stream = %request.root_hash.short_hex(), error = %e, "stream graph is corrupt");
            LinearResponse::empty(request.request_id.clone(), request.root_hash)
        }
    }
}
