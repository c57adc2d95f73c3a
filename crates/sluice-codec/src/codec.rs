use std::io::{Read, Write};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};
use crate::registry::ContractRegistry;

/// Serialization capability injected into the transport and atomic store.
///
/// Implementations must round-trip: `deserialize(serialize(v)) == v` for
/// every type they are used with.
pub trait Codec: Send + Sync {
    /// Human-readable codec name, used in error messages.
    fn name(&self) -> &str;

    /// Contract names known to this codec.
    fn contracts(&self) -> &ContractRegistry;

    /// Write `value` to `sink`.
    fn serialize<T, W>(&self, value: &T, sink: W) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
        W: Write;

    /// Read a `T` from `source`.
    fn deserialize<T, R>(&self, source: R) -> CodecResult<T>
    where
        T: DeserializeOwned,
        R: Read;

    /// Contract name of `T`, or `None` if the type was never registered.
    fn contract_name_of<T: 'static>(&self) -> Option<&str> {
        self.contracts().contract_name_of::<T>()
    }

    /// Serialize into a fresh buffer.
    fn to_bytes<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(value, &mut buf)?;
        Ok(buf)
    }

    /// Deserialize from a byte slice.
    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        self.deserialize(bytes)
    }
}

/// Largest value [`BincodeCodec`] will decode unless told otherwise.
pub const DEFAULT_DECODE_LIMIT: u64 = 256 * 1024 * 1024;

/// Compact binary codec backed by `bincode`.
///
/// Uses bincode's default wire format (fixed-width little-endian integers).
/// Decoding is bounded: a length prefix that claims more than the decode
/// limit fails with [`CodecError::Deserialize`] instead of allocating.
#[derive(Clone, Debug)]
pub struct BincodeCodec {
    contracts: ContractRegistry,
    decode_limit: u64,
}

impl BincodeCodec {
    pub fn new(contracts: ContractRegistry) -> Self {
        Self {
            contracts,
            decode_limit: DEFAULT_DECODE_LIMIT,
        }
    }

    /// Cap the number of bytes a single decode may consume.
    pub fn with_decode_limit(mut self, limit: u64) -> Self {
        self.decode_limit = limit;
        self
    }

    pub fn decode_limit(&self) -> u64 {
        self.decode_limit
    }

    fn options(&self) -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(self.decode_limit)
    }

    fn deserialize_error(&self, e: bincode::Error) -> CodecError {
        CodecError::Deserialize {
            codec: self.name().into(),
            reason: e.to_string(),
        }
    }
}

impl Default for BincodeCodec {
    fn default() -> Self {
        Self::new(ContractRegistry::default())
    }
}

impl Codec for BincodeCodec {
    fn name(&self) -> &str {
        "bincode"
    }

    fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }

    fn serialize<T, W>(&self, value: &T, sink: W) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        bincode::serialize_into(sink, value).map_err(|e| CodecError::Serialize {
            codec: self.name().into(),
            reason: e.to_string(),
        })
    }

    fn deserialize<T, R>(&self, source: R) -> CodecResult<T>
    where
        T: DeserializeOwned,
        R: Read,
    {
        self.options()
            .deserialize_from(source)
            .map_err(|e| self.deserialize_error(e))
    }

    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        self.options()
            .deserialize(bytes)
            .map_err(|e| self.deserialize_error(e))
    }
}

/// Human-readable codec backed by `serde_json`.
#[derive(Clone, Debug, Default)]
pub struct JsonCodec {
    contracts: ContractRegistry,
}

impl JsonCodec {
    pub fn new(contracts: ContractRegistry) -> Self {
        Self { contracts }
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }

    fn serialize<T, W>(&self, value: &T, sink: W) -> CodecResult<()>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        serde_json::to_writer(sink, value).map_err(|e| CodecError::Serialize {
            codec: self.name().into(),
            reason: e.to_string(),
        })
    }

    fn deserialize<T, R>(&self, source: R) -> CodecResult<T>
    where
        T: DeserializeOwned,
        R: Read,
    {
        serde_json::from_reader(source).map_err(|e| CodecError::Deserialize {
            codec: self.name().into(),
            reason: e.to_string(),
        })
    }
}
