//! Queue message framing.
//!
//! ```text
//! data:      [0x01][u32 BE header len][bincode(Envelope)][payload bytes...]
//! reference: [0x02][u32 BE header len][bincode(ReferenceRecord)]
//! ```
//!
//! Headers are always bincode, independent of the payload codec, so a
//! reader can route a message before it knows the payload type.

use serde::Serialize;
use sluice_types::{Envelope, ReferenceRecord};

use crate::error::WireError;
use crate::message::{WireMessage, FRAME_PREFIX_LEN, KIND_DATA, KIND_REFERENCE};

/// Codec for encoding/decoding queue messages.
pub struct WireCodec;

impl WireCodec {
    /// Encode a data message. `write_body` appends the serialized payload
    /// directly after the header.
    pub fn encode_data<F, E>(envelope: &Envelope, write_body: F) -> Result<Vec<u8>, E>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), E>,
        E: From<WireError>,
    {
        let mut buf = Self::frame_header(KIND_DATA, envelope)?;
        write_body(&mut buf)?;
        Ok(buf)
    }

    /// Encode a reference message.
    pub fn encode_reference(record: &ReferenceRecord) -> Result<Vec<u8>, WireError> {
        Self::frame_header(KIND_REFERENCE, record)
    }

    fn frame_header<H: Serialize>(kind: u8, header: &H) -> Result<Vec<u8>, WireError> {
        let header = bincode::serialize(header).map_err(|e| WireError::Header(e.to_string()))?;
        let len = u32::try_from(header.len())
            .map_err(|_| WireError::Framing(format!("header too large: {} bytes", header.len())))?;
        let mut buf = Vec::with_capacity(FRAME_PREFIX_LEN + header.len());
        buf.push(kind);
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&header);
        Ok(buf)
    }

    /// Decode a queue message.
    pub fn decode(data: &[u8]) -> Result<WireMessage, WireError> {
        if data.len() < FRAME_PREFIX_LEN {
            return Err(WireError::Framing("too short".into()));
        }
        let kind = data[0];
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&data[1..FRAME_PREFIX_LEN]);
        let len = u32::from_be_bytes(len_bytes) as usize;
        let end = FRAME_PREFIX_LEN
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                WireError::Framing(format!(
                    "incomplete header: have {}, need {}",
                    data.len() - FRAME_PREFIX_LEN,
                    len
                ))
            })?;
        let header = &data[FRAME_PREFIX_LEN..end];

        match kind {
            KIND_DATA => {
                let envelope: Envelope =
                    bincode::deserialize(header).map_err(|e| WireError::Header(e.to_string()))?;
                Ok(WireMessage::Data {
                    envelope,
                    body: data[end..].to_vec(),
                })
            }
            KIND_REFERENCE => {
                if end != data.len() {
                    return Err(WireError::Framing(format!(
                        "{} trailing bytes after reference record",
                        data.len() - end
                    )));
                }
                let record: ReferenceRecord =
                    bincode::deserialize(header).map_err(|e| WireError::Header(e.to_string()))?;
                Ok(WireMessage::Reference(record))
            }
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use sluice_types::{MessageId, ReferenceId, ReferenceIdFormat};

    fn envelope() -> Envelope {
        Envelope::builder()
            .add_identity(MessageId::new())
            .add_contract("orders.placed")
            .add_sender("memory://orders")
            .add_created(Utc::now())
            .build()
            .unwrap()
    }

    fn record() -> ReferenceRecord {
        let id = MessageId::new();
        let reference_id =
            ReferenceId::compose(&ReferenceIdFormat::default(), &Utc::now(), &id).unwrap();
        ReferenceRecord::new(id, "orders.placed", "memory://orders", reference_id)
    }

    #[test]
    fn data_frame_layout() {
        let env = envelope();
        let encoded =
            WireCodec::encode_data(&env, |buf| -> Result<(), WireError> {
                buf.extend_from_slice(b"payload");
                Ok(())
            })
            .unwrap();

        assert_eq!(encoded[0], KIND_DATA);
        let header_len = u32::from_be_bytes(encoded[1..5].try_into().unwrap()) as usize;
        assert_eq!(&encoded[5 + header_len..], b"payload");

        match WireCodec::decode(&encoded).unwrap() {
            WireMessage::Data { envelope, body } => {
                assert_eq!(envelope, env);
                assert_eq!(body, b"payload");
            }
            other => panic!("expected data, got {}", other.kind_name()),
        }
    }

    #[test]
    fn reference_frame_decodes() {
        let rec = record();
        let encoded = WireCodec::encode_reference(&rec).unwrap();
        assert_eq!(encoded[0], KIND_REFERENCE);
        let decoded = WireCodec::decode(&encoded).unwrap();
        assert_eq!(decoded.kind(), KIND_REFERENCE);
        assert_eq!(decoded.contract(), "orders.placed");
        assert_eq!(decoded, WireMessage::Reference(rec));
    }

    #[test]
    fn body_write_failure_propagates() {
        let err = WireCodec::encode_data(&envelope(), |_| {
            Err(WireError::Framing("body refused".into()))
        })
        .unwrap_err();
        assert!(matches!(err, WireError::Framing(_)));
    }

    #[test]
    fn decode_truncated() {
        let err = WireCodec::decode(&[KIND_DATA, 0, 0]).unwrap_err();
        assert!(matches!(err, WireError::Framing(_)));
    }

    #[test]
    fn decode_header_past_end() {
        let err = WireCodec::decode(&[KIND_DATA, 0, 0, 1, 0, 7]).unwrap_err();
        assert!(matches!(err, WireError::Framing(_)));
    }

    #[test]
    fn decode_unknown_kind() {
        let err = WireCodec::decode(&[0x7f, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, WireError::UnknownKind(0x7f)));
    }

    #[test]
    fn reference_with_trailing_bytes_is_rejected() {
        let mut encoded = WireCodec::encode_reference(&record()).unwrap();
        encoded.push(0);
        assert!(matches!(
            WireCodec::decode(&encoded).unwrap_err(),
            WireError::Framing(_)
        ));
    }

    #[test]
    fn garbage_header_is_rejected() {
        let err = WireCodec::decode(&[KIND_DATA, 0, 0, 0, 2, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, WireError::Header(_)));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = WireCodec::decode(&bytes);
        }

        #[test]
        fn any_body_survives_framing(body in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let env = envelope();
            let encoded = WireCodec::encode_data(&env, |buf| -> Result<(), WireError> {
                buf.extend_from_slice(&body);
                Ok(())
            })
            .unwrap();
            match WireCodec::decode(&encoded).unwrap() {
                WireMessage::Data { envelope, body: decoded } => {
                    prop_assert_eq!(envelope, env);
                    prop_assert_eq!(decoded, body);
                }
                other => prop_assert!(false, "expected data, got {}", other.kind_name()),
            }
        }
    }
}
