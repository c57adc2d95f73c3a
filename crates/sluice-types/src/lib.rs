//! Foundation types for sluice.
//!
//! This crate provides the identity and metadata types shared by the
//! transport and storage crates.
//!
//! # Key Types
//!
//! - [`MessageId`]: UUID v7 identity of one logical send
//! - [`Envelope`]: Validated message metadata built with [`EnvelopeBuilder`]
//! - [`ReferenceId`]: Sortable blob name `<timestamp>-<message id>`
//! - [`ReferenceIdFormat`]: Timestamp layout of reference ids
//! - [`ReferenceRecord`]: Stand-in message for a payload spilled to a blob

pub mod envelope;
pub mod error;
pub mod message_id;
pub mod reference;

pub use envelope::{Envelope, EnvelopeBuilder, MessageAttribute};
pub use error::TypeError;
pub use message_id::MessageId;
pub use reference::{ReferenceId, ReferenceIdFormat, ReferenceRecord};
