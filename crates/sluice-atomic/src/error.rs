//! Error types for atomic store operations.

use sluice_codec::CodecError;
use thiserror::Error;

/// Errors that can occur during atomic store operations.
///
/// Absence is not an error: lookups and deletes report it as `None` /
/// `false`.
#[derive(Debug, Error)]
pub enum AtomicError {
    /// The rendered key cannot be used as an entry name.
    #[error("invalid key: {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// An update-only operation found no entry.
    #[error("entry not found: {name}")]
    NotFound { name: String },

    /// Stored bytes could not be encoded or decoded. Never retried.
    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// The backing map failed.
    #[error("backing map error: {0}")]
    Backend(String),
}

/// Convenience type alias for atomic store operations.
pub type Result<T> = std::result::Result<T, AtomicError>;
