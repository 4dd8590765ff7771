//! Wire protocol for Weft stream synchronization.
//!
//! Defines the messages peers exchange while reconciling stream graphs and
//! the length-prefixed framing used to put them on the wire.
//!
//! # Exchanges
//!
//! - [`RequestLinear`] / [`LinearResponse`] -- paginated listing of a stream's digests
//! - [`ObjectRequest`] / [`ObjectResponse`] -- a single object body by digest
//! - [`Announcement`] -- unsolicited notice that a stream has new objects

pub mod codec;
pub mod error;
pub mod message;

pub use codec::WeftCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    new_request_id, Announcement, LinearResponse, MessageKind, ObjectRequest, ObjectResponse,
    RequestLinear, WeftMessage, MAX_MESSAGE_SIZE,
};
