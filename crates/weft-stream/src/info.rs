use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use weft_types::{Digest, Metadata, Object};

/// Descriptive state of one applied object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub object_type: String,
    pub digest: Digest,
    pub metadata: Metadata,
}

impl ObjectInfo {
    pub fn new(object: &Object, digest: Digest) -> Self {
        Self {
            object_type: object.object_type.clone(),
            digest,
            metadata: object.metadata.clone(),
        }
    }
}

/// What a controller knows about its stream.
///
/// Empty until the root is applied. `objects` holds every object ever
/// applied, the root included.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub root_type: String,
    pub root_digest: Digest,
    pub root_object: Option<Object>,
    pub objects: BTreeMap<Digest, ObjectInfo>,
}

impl StreamInfo {
    /// Returns `true` once a root object has been applied.
    pub fn is_rooted(&self) -> bool {
        self.root_object.is_some()
    }

    /// The root digest, if rooted.
    pub fn root(&self) -> Option<Digest> {
        self.is_rooted().then_some(self.root_digest)
    }

    /// Number of recorded objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}
