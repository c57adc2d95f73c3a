use sluice_codec::CodecError;
use sluice_types::TypeError;
use thiserror::Error;

use crate::writer::Delivery;

/// Failures of the raw queue channel. Transient from the transport's point
/// of view; retry policy belongs to the channel or the caller.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("queue message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("queue I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid blob name: {0}")]
    InvalidName(String),

    #[error("blob container unavailable: {0}")]
    Unavailable(String),

    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed queue message frames.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown message kind: {0:#04x}")]
    UnknownKind(u8),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("header encoding error: {0}")]
    Header(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The payload type has no contract name. A programming or setup error;
    /// never retried.
    #[error("no contract name for payload type '{type_name}'; register it with the '{codec}' codec")]
    Configuration {
        type_name: &'static str,
        codec: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    #[error("message metadata error: {0}")]
    Metadata(#[from] TypeError),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("referenced blob {reference_id} not found in {container}")]
    MissingBlob {
        reference_id: String,
        container: String,
    },

    #[error("blob {reference_id} holds message {actual}, reference names {expected}")]
    ReferenceMismatch {
        reference_id: String,
        expected: String,
        actual: String,
    },

    #[error("message contract '{actual}' does not match requested type (expects '{expected}')")]
    ContractMismatch { expected: String, actual: String },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// A `send` call that stopped at its first failure.
///
/// `delivered` lists the payloads that reached the queue before the failing
/// one; later payloads were never attempted.
#[derive(Debug, Error)]
#[error("send aborted after {} delivered message(s): {error}", delivered.len())]
pub struct SendFailure {
    pub delivered: Vec<Delivery>,
    #[source]
    pub error: TransportError,
}
