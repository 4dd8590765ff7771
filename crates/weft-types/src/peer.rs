use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a remote peer.
///
/// The transport layer decides what the string means (a public key, a
/// socket address, a relay path); the sync engine only compares and routes it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

impl From<String> for PeerId {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}
