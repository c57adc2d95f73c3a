//! Receiving side: turns queue messages back into envelopes and payloads.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use sluice_codec::Codec;
use sluice_types::{Envelope, ReferenceRecord};
use tracing::{debug, warn};

use crate::blob::BlobStore;
use crate::codec::WireCodec;
use crate::error::{TransportError, TransportResult};
use crate::message::WireMessage;

/// A queue message with any blob reference already resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub envelope: Envelope,
    /// Payload bytes as written by the sender's codec.
    pub body: Vec<u8>,
    /// The reference the message arrived through, if it overflowed.
    pub reference: Option<ReferenceRecord>,
}

impl ReceivedMessage {
    pub fn is_overflow(&self) -> bool {
        self.reference.is_some()
    }

    /// Deserialize the payload as `T`, which must be registered with
    /// `codec` under the contract named in the envelope.
    pub fn decode<T, C>(&self, codec: &C) -> TransportResult<T>
    where
        T: DeserializeOwned + 'static,
        C: Codec,
    {
        let actual = self.envelope.contract();
        if !codec.contracts().is_contract_of::<T>(actual) {
            return Err(TransportError::ContractMismatch {
                expected: codec
                    .contract_name_of::<T>()
                    .unwrap_or("<unregistered>")
                    .to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(codec.from_bytes(&self.body)?)
    }
}

pub struct HybridReader {
    blobs: Arc<dyn BlobStore>,
}

impl HybridReader {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Decode one queue message, downloading the blob behind a reference.
    pub fn open(&self, message: &[u8]) -> TransportResult<ReceivedMessage> {
        let record = match WireCodec::decode(message)? {
            WireMessage::Data { envelope, body } => {
                return Ok(ReceivedMessage {
                    envelope,
                    body,
                    reference: None,
                })
            }
            WireMessage::Reference(record) => record,
        };

        if record.container != self.blobs.location() {
            warn!(
                expected = %record.container,
                actual = %self.blobs.location(),
                reference_id = %record.reference_id,
                "reference names a different container"
            );
        }

        let blob = self
            .blobs
            .download(&record.reference_id)?
            .ok_or_else(|| TransportError::MissingBlob {
                reference_id: record.reference_id.to_string(),
                container: self.blobs.location().to_string(),
            })?;

        match WireCodec::decode(&blob)? {
            WireMessage::Data { envelope, body } if envelope.message_id() == record.message_id => {
                debug!(
                    message_id = %record.message_id,
                    reference_id = %record.reference_id,
                    size = blob.len(),
                    "resolved overflow reference"
                );
                Ok(ReceivedMessage {
                    envelope,
                    body,
                    reference: Some(record),
                })
            }
            WireMessage::Data { envelope, .. } => Err(TransportError::ReferenceMismatch {
                reference_id: record.reference_id.to_string(),
                expected: record.message_id.to_string(),
                actual: envelope.message_id().to_string(),
            }),
            WireMessage::Reference(nested) => Err(TransportError::ReferenceMismatch {
                reference_id: record.reference_id.to_string(),
                expected: record.message_id.to_string(),
                actual: format!("nested reference {}", nested.reference_id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use sluice_codec::{ContractRegistry, JsonCodec};
    use sluice_types::{MessageId, ReferenceId, ReferenceIdFormat};

    use super::*;
    use crate::blob::{DirectoryBlobContainer, InMemoryBlobContainer};
    use crate::channel::{DirectoryQueue, InMemoryQueue, QueueChannel};
    use crate::config::TransportConfig;
    use crate::writer::HybridWriter;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Report {
        title: String,
        lines: Vec<String>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    fn codec() -> Arc<JsonCodec> {
        let registry = ContractRegistry::new()
            .with::<Report>("test.report")
            .unwrap()
            .with::<Ping>("test.ping")
            .unwrap();
        Arc::new(JsonCodec::new(registry))
    }

    fn report(lines: usize) -> Report {
        Report {
            title: "nightly".into(),
            lines: (0..lines).map(|i| format!("line {i:05}")).collect(),
        }
    }

    #[test]
    fn inline_and_overflow_both_resolve() {
        let codec = codec();
        let queue = Arc::new(InMemoryQueue::new("reports", 8192));
        let blobs = Arc::new(InMemoryBlobContainer::new("reports"));
        let writer = HybridWriter::new(
            TransportConfig::default(),
            codec.clone(),
            queue.clone(),
            blobs.clone(),
        )
        .unwrap();
        let reader = HybridReader::new(blobs.clone());

        let payloads = vec![report(3), report(2_000)];
        let delivered = writer.send(&payloads).unwrap();
        assert!(!delivered[0].is_overflow());
        assert!(delivered[1].is_overflow());

        for (expected, delivery) in payloads.iter().zip(&delivered) {
            let received = reader.open(&queue.pop().unwrap()).unwrap();
            assert_eq!(received.envelope.message_id(), delivery.message_id);
            assert_eq!(received.is_overflow(), delivery.is_overflow());
            let decoded: Report = received.decode(codec.as_ref()).unwrap();
            assert_eq!(&decoded, expected);
        }
    }

    #[test]
    fn overflow_body_matches_uploaded_bytes() {
        let codec = codec();
        let queue = Arc::new(InMemoryQueue::new("reports", 8192));
        let blobs = Arc::new(InMemoryBlobContainer::new("reports"));
        let writer =
            HybridWriter::new(TransportConfig::default(), codec, queue.clone(), blobs.clone())
                .unwrap();
        writer.send_one(&report(1_000)).unwrap();

        let received = HybridReader::new(blobs.clone())
            .open(&queue.pop().unwrap())
            .unwrap();
        let record = received.reference.clone().unwrap();
        let blob = blobs.download(&record.reference_id).unwrap().unwrap();
        assert!(blob.ends_with(&received.body));
    }

    #[test]
    fn missing_blob_is_reported() {
        let blobs = Arc::new(InMemoryBlobContainer::new("reports"));
        let id = MessageId::new();
        let reference_id =
            ReferenceId::compose(&ReferenceIdFormat::default(), &Utc::now(), &id).unwrap();
        let record = ReferenceRecord::new(id, "test.report", blobs.location(), reference_id);
        let message = WireCodec::encode_reference(&record).unwrap();

        let err = HybridReader::new(blobs).open(&message).unwrap_err();
        assert!(matches!(err, TransportError::MissingBlob { .. }));
    }

    #[test]
    fn blob_for_another_message_is_rejected() {
        let codec = codec();
        let queue = Arc::new(InMemoryQueue::new("reports", 8192));
        let blobs = Arc::new(InMemoryBlobContainer::new("reports"));
        let writer =
            HybridWriter::new(TransportConfig::default(), codec, queue.clone(), blobs.clone())
                .unwrap();
        let delivery = writer.send_one(&report(1_000)).unwrap();
        queue.drain();

        let crate::writer::Route::Overflow { reference_id } = delivery.route else {
            panic!("expected overflow");
        };
        let forged = ReferenceRecord::new(
            MessageId::new(),
            "test.report",
            blobs.location(),
            reference_id,
        );
        let err = HybridReader::new(blobs)
            .open(&WireCodec::encode_reference(&forged).unwrap())
            .unwrap_err();
        assert!(matches!(err, TransportError::ReferenceMismatch { .. }));
    }

    #[test]
    fn decode_checks_contract() {
        let codec = codec();
        let queue = Arc::new(InMemoryQueue::new("pings", 8192));
        let blobs = Arc::new(InMemoryBlobContainer::new("pings"));
        let writer =
            HybridWriter::new(TransportConfig::default(), codec.clone(), queue.clone(), blobs.clone())
                .unwrap();
        writer.send_one(&Ping { seq: 7 }).unwrap();

        let received = HybridReader::new(blobs).open(&queue.pop().unwrap()).unwrap();
        let err = received.decode::<Report, _>(codec.as_ref()).unwrap_err();
        match err {
            TransportError::ContractMismatch { expected, actual } => {
                assert_eq!(expected, "test.report");
                assert_eq!(actual, "test.ping");
            }
            other => panic!("expected contract mismatch, got {other}"),
        }
        assert_eq!(
            received.decode::<Ping, _>(codec.as_ref()).unwrap(),
            Ping { seq: 7 }
        );
    }

    #[test]
    fn corrupt_message_is_a_wire_error() {
        let blobs = Arc::new(InMemoryBlobContainer::new("x"));
        let err = HybridReader::new(blobs).open(&[9, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, TransportError::Wire(_)));
    }

    #[test]
    fn directory_spool_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec();
        let queue = Arc::new(DirectoryQueue::open(dir.path().join("queue"), 8192).unwrap());
        let blobs = Arc::new(DirectoryBlobContainer::new(dir.path().join("blobs")));
        let writer =
            HybridWriter::new(TransportConfig::default(), codec.clone(), queue.clone(), blobs.clone())
                .unwrap();
        writer.ensure_exists().unwrap();

        writer
            .send(&[report(1), report(1_500), report(2)])
            .unwrap();
        assert_eq!(queue.len().unwrap(), 3);

        let reader = HybridReader::new(blobs);
        let mut sizes = Vec::new();
        while let Some(message) = queue.pop().unwrap() {
            let decoded: Report = reader.open(&message).unwrap().decode(codec.as_ref()).unwrap();
            sizes.push(decoded.lines.len());
        }
        assert_eq!(sizes, vec![1, 1_500, 2]);
        assert_eq!(queue.address(), format!("file://{}", dir.path().join("queue").display()));
    }
}
