//! Serialization codecs for sluice.
//!
//! A [`Codec`] turns typed values into bytes and back, and maps payload
//! types to stable contract names through an explicit [`ContractRegistry`].
//!
//! - [`BincodeCodec`]: compact binary encoding (default)
//! - [`JsonCodec`]: human-readable encoding

pub mod codec;
pub mod error;
pub mod registry;

pub use codec::{BincodeCodec, Codec, JsonCodec, DEFAULT_DECODE_LIMIT};
pub use error::{CodecError, CodecResult};
pub use registry::{Contract, ContractRegistry};
