//! Stream objects and their metadata.
//!
//! An [`Object`] is an immutable typed record. Its [`Metadata`] ties it to a
//! stream (via the root digest) and to its causal predecessors (via
//! [`Parents`]). The digest of an object is derived from its full content,
//! metadata included, by the content-addressing primitive in `weft-crypto`.

use std::collections::{BTreeMap, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::{TypeError, TypeResult};

/// Parent edges of an object, grouped by label.
///
/// Only the [`Parents::ALL_GROUP`] (`"*"`) group is used by stream
/// controllers, but the map shape is part of the wire format. A `BTreeMap`
/// keeps the encoding (and therefore the digest) deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parents(BTreeMap<String, Vec<Digest>>);

impl Parents {
    /// The conventional edge-group label.
    pub const ALL_GROUP: &'static str = "*";

    /// No parents at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parents under the conventional `"*"` group.
    pub fn all(digests: Vec<Digest>) -> Self {
        let mut parents = Self::new();
        parents.insert(Self::ALL_GROUP, digests);
        parents
    }

    /// Set the digests of an edge group, replacing any previous value.
    pub fn insert(&mut self, group: impl Into<String>, digests: Vec<Digest>) {
        self.0.insert(group.into(), digests);
    }

    /// Digests of a single edge group.
    pub fn group(&self, group: &str) -> Option<&[Digest]> {
        self.0.get(group).map(Vec::as_slice)
    }

    /// Iterate over `(label, digests)` pairs in label order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[Digest])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// All parent digests across every group, deduplicated, in first-seen order.
    pub fn flatten(&self) -> Vec<Digest> {
        let mut seen = HashSet::new();
        self.0
            .values()
            .flatten()
            .filter(|d| seen.insert(**d))
            .copied()
            .collect()
    }

    /// Returns `true` if no group holds any digest.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

/// Stream bookkeeping attached to every object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Digest of the stream's root object; empty for the root itself.
    pub root: Digest,
    /// Causal predecessors; empty for the root.
    pub parents: Parents,
    /// Number of distinct ancestors between this object and the root.
    /// Zero means "not set" for non-root objects.
    pub sequence: u64,
}

/// An immutable, content-addressed record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// Content-type tag, e.g. `"stream:chat/message"`.
    #[serde(rename = "@type")]
    pub object_type: String,
    /// Stream bookkeeping.
    pub metadata: Metadata,
    /// Opaque application payload.
    pub data: Vec<u8>,
}

impl Object {
    /// Create an object with empty metadata.
    pub fn new(object_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            object_type: object_type.into(),
            metadata: Metadata::default(),
            data,
        }
    }

    /// Create an object whose payload is the bincode encoding of `value`.
    pub fn encode_data<T: Serialize>(object_type: impl Into<String>, value: &T) -> TypeResult<Self> {
        let data = bincode::serialize(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::new(object_type, data))
    }

    /// Decode the payload previously written by [`Object::encode_data`].
    pub fn decode_data<T: DeserializeOwned>(&self) -> TypeResult<T> {
        bincode::deserialize(&self.data).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Set the stream root.
    pub fn with_root(mut self, root: Digest) -> Self {
        self.metadata.root = root;
        self
    }

    /// Set the parent edges.
    pub fn with_parents(mut self, parents: Parents) -> Self {
        self.metadata.parents = parents;
        self
    }

    /// Set the sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.metadata.sequence = sequence;
        self
    }

    /// Returns `true` if this object does not reference a stream root.
    pub fn is_root(&self) -> bool {
        self.metadata.root.is_empty()
    }
}

/// Conversion of application events into generic objects.
///
/// Stream controllers accept anything implementing this trait, so
/// applications can hand over their own event types directly.
pub trait IntoObject {
    fn into_object(self) -> TypeResult<Object>;
}

impl IntoObject for Object {
    fn into_object(self) -> TypeResult<Object> {
        Ok(self)
    }
}

impl IntoObject for &Object {
    fn into_object(self) -> TypeResult<Object> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(byte: u8) -> Digest {
        Digest::from_hash([byte; 32])
    }

    #[test]
    fn parents_all_uses_star_group() {
        let parents = Parents::all(vec![d(1), d(2)]);
        assert_eq!(parents.group("*"), Some(&[d(1), d(2)][..]));
        assert!(parents.group("other").is_none());
        assert!(!parents.is_empty());
    }

    #[test]
    fn parents_flatten_dedups_across_groups() {
        let mut parents = Parents::all(vec![d(1), d(2)]);
        parents.insert("extra", vec![d(2), d(3)]);
        let flat = parents.flatten();
        assert_eq!(flat.len(), 3);
        assert!(flat.contains(&d(3)));
    }

    #[test]
    fn empty_groups_count_as_no_parents() {
        let mut parents = Parents::new();
        assert!(parents.is_empty());
        parents.insert("*", vec![]);
        assert!(parents.is_empty());
    }

    #[test]
    fn builder_sets_metadata() {
        let obj = Object::new("note", b"hi".to_vec())
            .with_root(d(9))
            .with_parents(Parents::all(vec![d(1)]))
            .with_sequence(4);
        assert!(!obj.is_root());
        assert_eq!(obj.metadata.root, d(9));
        assert_eq!(obj.metadata.sequence, 4);
    }

    #[test]
    fn encode_and_decode_payload() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Message {
            body: String,
        }
        let obj = Object::encode_data("chat", &Message { body: "hello".into() }).unwrap();
        assert_eq!(obj.object_type, "chat");
        let back: Message = obj.decode_data().unwrap();
        assert_eq!(back.body, "hello");
    }

    #[test]
    fn type_field_serializes_as_at_type() {
        let obj = Object::new("note", vec![]);
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["@type"], "note");
        assert!(json["metadata"]["parents"].as_object().unwrap().is_empty());
    }
}
