use serde::{Deserialize, Serialize};
use weft_types::{Digest, Object};

pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// A fresh, time-ordered correlation identifier for a request.
pub fn new_request_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Ask a peer for a page of the digests it holds for a stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLinear {
    pub request_id: String,
    pub root_hash: Digest,
    pub limit: i64,
    pub skip: i64,
}

impl RequestLinear {
    pub fn new(root_hash: Digest, limit: i64, skip: i64) -> Self {
        Self {
            request_id: new_request_id(),
            root_hash,
            limit,
            skip,
        }
    }
}

/// One page of digests plus the total the responder knows about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearResponse {
    pub request_id: String,
    pub root_hash: Digest,
    pub leaves: Vec<Digest>,
    pub total: i64,
}

impl LinearResponse {
    /// The answer for a stream the responder does not know.
    pub fn empty(request_id: impl Into<String>, root_hash: Digest) -> Self {
        Self {
            request_id: request_id.into(),
            root_hash,
            leaves: Vec::new(),
            total: 0,
        }
    }

    /// Slice the page `[skip, skip + limit)` out of `digests`.
    ///
    /// Negative `skip` is treated as zero and a non-positive `limit` yields
    /// an empty page. `total` is always the full length.
    pub fn page(request: &RequestLinear, digests: &[Digest]) -> Self {
        let start = usize::try_from(request.skip.max(0))
            .unwrap_or(usize::MAX)
            .min(digests.len());
        let limit = usize::try_from(request.limit.max(0)).unwrap_or(usize::MAX);
        let end = start.saturating_add(limit).min(digests.len());
        Self {
            request_id: request.request_id.clone(),
            root_hash: request.root_hash,
            leaves: digests[start..end].to_vec(),
            total: digests.len() as i64,
        }
    }
}

/// Unsolicited notice that objects exist for a stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub stream_hash: Digest,
    pub object_hashes: Vec<Digest>,
}

/// Ask a peer for one object body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRequest {
    pub request_id: String,
    pub object_hash: Digest,
}

impl ObjectRequest {
    pub fn new(object_hash: Digest) -> Self {
        Self {
            request_id: new_request_id(),
            object_hash,
        }
    }
}

/// The requested object, or `None` if the responder does not have it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResponse {
    pub request_id: String,
    pub object: Option<Object>,
}

/// Discriminant of a [`WeftMessage`], used for subscription filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    RequestLinear,
    LinearResponse,
    Announcement,
    ObjectRequest,
    ObjectResponse,
}

impl MessageKind {
    pub fn type_tag(self) -> u8 {
        match self {
            Self::RequestLinear => 1,
            Self::LinearResponse => 2,
            Self::Announcement => 3,
            Self::ObjectRequest => 4,
            Self::ObjectResponse => 5,
        }
    }

    pub fn from_type_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::RequestLinear),
            2 => Some(Self::LinearResponse),
            3 => Some(Self::Announcement),
            4 => Some(Self::ObjectRequest),
            5 => Some(Self::ObjectResponse),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RequestLinear => "RequestLinear",
            Self::LinearResponse => "LinearResponse",
            Self::Announcement => "Announcement",
            Self::ObjectRequest => "ObjectRequest",
            Self::ObjectResponse => "ObjectResponse",
        }
    }
}

/// All message types in the Weft sync protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeftMessage {
    RequestLinear(RequestLinear),
    LinearResponse(LinearResponse),
    Announcement(Announcement),
    ObjectRequest(ObjectRequest),
    ObjectResponse(ObjectResponse),
}

impl WeftMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::RequestLinear(_) => MessageKind::RequestLinear,
            Self::LinearResponse(_) => MessageKind::LinearResponse,
            Self::Announcement(_) => MessageKind::Announcement,
            Self::ObjectRequest(_) => MessageKind::ObjectRequest,
            Self::ObjectResponse(_) => MessageKind::ObjectResponse,
        }
    }

    pub fn type_tag(&self) -> u8 {
        self.kind().type_tag()
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Correlation identifier; announcements carry none.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::RequestLinear(m) => Some(&m.request_id),
            Self::LinearResponse(m) => Some(&m.request_id),
            Self::ObjectRequest(m) => Some(&m.request_id),
            Self::ObjectResponse(m) => Some(&m.request_id),
            Self::Announcement(_) => None,
        }
    }
}

impl From<RequestLinear> for WeftMessage {
    fn from(m: RequestLinear) -> Self {
        Self::RequestLinear(m)
    }
}

impl From<LinearResponse> for WeftMessage {
    fn from(m: LinearResponse) -> Self {
        Self::LinearResponse(m)
    }
}

impl From<Announcement> for WeftMessage {
    fn from(m: Announcement) -> Self {
        Self::Announcement(m)
    }
}

impl From<ObjectRequest> for WeftMessage {
    fn from(m: ObjectRequest) -> Self {
        Self::ObjectRequest(m)
    }
}

impl From<ObjectResponse> for WeftMessage {
    fn from(m: ObjectResponse) -> Self {
        Self::ObjectResponse(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digests(n: u8) -> Vec<Digest> {
        (0..n).map(|i| Digest::from_hash([i; 32])).collect()
    }

    fn request(limit: i64, skip: i64) -> RequestLinear {
        RequestLinear::new(Digest::from_bytes(b"root"), limit, skip)
    }

    #[test]
    fn request_ids_are_unique() {
        let a = ObjectRequest::new(Digest::empty());
        let b = ObjectRequest::new(Digest::empty());
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn page_slices_and_reports_total() {
        let all = digests(10);
        let page = LinearResponse::page(&request(4, 0), &all);
        assert_eq!(page.leaves, all[0..4]);
        assert_eq!(page.total, 10);

        let page = LinearResponse::page(&request(4, 8), &all);
        assert_eq!(page.leaves, all[8..10]);
        assert_eq!(page.total, 10);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let all = digests(3);
        let page = LinearResponse::page(&request(100, 50), &all);
        assert!(page.leaves.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn page_clamps_negative_values() {
        let all = digests(3);
        assert_eq!(LinearResponse::page(&request(2, -5), &all).leaves, all[0..2]);
        assert!(LinearResponse::page(&request(-1, 0), &all).leaves.is_empty());
    }

    #[test]
    fn page_keeps_request_identity() {
        let req = request(1, 0);
        let page = LinearResponse::page(&req, &digests(2));
        assert_eq!(page.request_id, req.request_id);
        assert_eq!(page.root_hash, req.root_hash);
    }

    #[test]
    fn kinds_and_tags_agree() {
        let msgs: Vec<WeftMessage> = vec![
            request(1, 0).into(),
            LinearResponse::empty("r", Digest::empty()).into(),
            Announcement { stream_hash: Digest::empty(), object_hashes: vec![] }.into(),
            ObjectRequest::new(Digest::empty()).into(),
            ObjectResponse { request_id: "r".into(), object: None }.into(),
        ];
        let mut tags: Vec<u8> = msgs.iter().map(|m| m.type_tag()).collect();
        for msg in &msgs {
            assert_eq!(MessageKind::from_type_tag(msg.type_tag()), Some(msg.kind()));
            assert_eq!(msg.type_name(), msg.kind().name());
        }
        let len = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), len, "type tags should be unique");
        assert_eq!(MessageKind::from_type_tag(0), None);
    }

    #[test]
    fn announcements_have_no_request_id() {
        let msg: WeftMessage = Announcement {
            stream_hash: Digest::empty(),
            object_hashes: vec![],
        }
        .into();
        assert_eq!(msg.request_id(), None);

        let req = request(1, 0);
        let id = req.request_id.clone();
        assert_eq!(WeftMessage::from(req).request_id(), Some(id.as_str()));
    }
}
