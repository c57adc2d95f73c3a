//! Hybrid queue transport.
//!
//! [`HybridWriter`] sends each payload as one queue message. Messages that
//! fit below the overflow threshold travel inline; larger ones are uploaded
//! to a blob container and replaced on the queue by a small
//! [`ReferenceRecord`](sluice_types::ReferenceRecord). [`HybridReader`]
//! reverses the process on the receiving side.

pub mod blob;
pub mod channel;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use blob::{BlobStore, DirectoryBlobContainer, InMemoryBlobContainer};
pub use channel::{DirectoryQueue, InMemoryQueue, QueueChannel, QueuedMessage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::WireCodec;
pub use config::{TransportConfig, DEFAULT_CHANNEL_MAX_MESSAGE, DEFAULT_OVERFLOW_THRESHOLD};
pub use error::{
    BlobError, ChannelError, SendFailure, TransportError, TransportResult, WireError,
};
pub use message::{WireMessage, KIND_DATA, KIND_REFERENCE};
pub use reader::{HybridReader, ReceivedMessage};
pub use writer::{Delivery, HybridWriter, Route};
