use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{MessageKind, WeftMessage, MAX_MESSAGE_SIZE};

/// Codec for encoding/decoding Weft protocol messages.
pub struct WeftCodec;

impl WeftCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &WeftMessage) -> ProtocolResult<Bytes> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());
        buf.put_u32((payload.len() + 1) as u32);
        buf.put_u8(msg.type_tag());
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(WeftMessage, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let tag = data[4];
        let kind = MessageKind::from_type_tag(tag).ok_or(ProtocolError::InvalidMessageType(tag))?;
        let msg = Self::decode_payload(&data[5..total])?;
        if msg.kind() != kind {
            return Err(ProtocolError::FramingError(format!(
                "tag says {}, payload is {}",
                kind.name(),
                msg.type_name()
            )));
        }
        Ok((msg, total))
    }

    /// Decode every frame in a buffer of back-to-back frames.
    pub fn decode_all(mut data: &[u8]) -> ProtocolResult<Vec<WeftMessage>> {
        let mut out = Vec::new();
        while !data.is_empty() {
            let (msg, consumed) = Self::decode(data)?;
            out.push(msg);
            data = &data[consumed..];
        }
        Ok(out)
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &WeftMessage) -> ProtocolResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<WeftMessage> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::*;
    use weft_types::{Digest, Object, Parents};

    fn root() -> Digest {
        Digest::from_bytes(b"stream root")
    }

    #[test]
    fn frame_layout() {
        let msg: WeftMessage = RequestLinear::new(root(), 100, 0).into();
        let encoded = WeftCodec::encode(&msg).unwrap();
        let len = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        assert_eq!(len + 4, encoded.len());
        assert_eq!(encoded[4], MessageKind::RequestLinear.type_tag());
    }

    #[test]
    fn linear_response_survives_the_wire() {
        let msg: WeftMessage = LinearResponse {
            request_id: new_request_id(),
            root_hash: root(),
            leaves: vec![Digest::from_bytes(b"a"), Digest::from_bytes(b"b")],
            total: 2,
        }
        .into();
        let encoded = WeftCodec::encode(&msg).unwrap();
        let (decoded, consumed) = WeftCodec::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn object_response_carries_full_object() {
        let object = Object::new("chat/message", b"hi".to_vec())
            .with_root(root())
            .with_parents(Parents::all(vec![root()]))
            .with_sequence(1);
        let msg: WeftMessage = ObjectResponse {
            request_id: "req".into(),
            object: Some(object),
        }
        .into();
        let (decoded, _) = WeftCodec::decode(&WeftCodec::encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_all_splits_frames() {
        let a: WeftMessage = ObjectRequest::new(root()).into();
        let b: WeftMessage = Announcement {
            stream_hash: root(),
            object_hashes: vec![root()],
        }
        .into();
        let mut buf = WeftCodec::encode(&a).unwrap().to_vec();
        buf.extend_from_slice(&WeftCodec::encode(&b).unwrap());
        assert_eq!(WeftCodec::decode_all(&buf).unwrap(), vec![a, b]);
    }

    #[test]
    fn decode_truncated() {
        let err = WeftCodec::decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));

        let encoded = WeftCodec::encode(&ObjectRequest::new(root()).into()).unwrap();
        let err = WeftCodec::decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_zero_length() {
        let data = [0u8, 0, 0, 0, 0]; // length = 0
        let err = WeftCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_oversized() {
        let len = (MAX_MESSAGE_SIZE as u32 + 2).to_be_bytes();
        let data = [len[0], len[1], len[2], len[3], 1];
        let err = WeftCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn decode_unknown_tag() {
        let mut encoded = WeftCodec::encode(&ObjectRequest::new(root()).into())
            .unwrap()
            .to_vec();
        encoded[4] = 0xEE;
        let err = WeftCodec::decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessageType(0xEE)));
    }

    #[test]
    fn decode_tag_payload_mismatch() {
        let mut encoded = WeftCodec::encode(&ObjectRequest::new(root()).into())
            .unwrap()
            .to_vec();
        encoded[4] = MessageKind::Announcement.type_tag();
        let err = WeftCodec::decode(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn garbage_payload_is_rejected() {
        let data = [0u8, 0, 0, 3, 1, 0xFF, 0xFF];
        let err = WeftCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::Deserialization(_)));
    }
}
