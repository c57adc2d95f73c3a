use sluice_types::{Envelope, ReferenceRecord};

/// Kind byte of a message carrying envelope and payload inline.
pub const KIND_DATA: u8 = 0x01;
/// Kind byte of a message carrying only a [`ReferenceRecord`].
pub const KIND_REFERENCE: u8 = 0x02;

/// Kind byte plus the 4-byte header length.
pub const FRAME_PREFIX_LEN: usize = 5;

/// A decoded queue message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireMessage {
    /// Envelope and serialized payload in one buffer.
    Data { envelope: Envelope, body: Vec<u8> },
    /// Pointer to a blob holding a full data message.
    Reference(ReferenceRecord),
}

impl WireMessage {
    pub fn kind(&self) -> u8 {
        match self {
            Self::Data { .. } => KIND_DATA,
            Self::Reference(_) => KIND_REFERENCE,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Data { .. } => "Data",
            Self::Reference(_) => "Reference",
        }
    }

    /// Contract of the payload, whether inline or referenced.
    pub fn contract(&self) -> &str {
        match self {
            Self::Data { envelope, .. } => envelope.contract(),
            Self::Reference(record) => &record.contract,
        }
    }
}
