use thiserror::Error;

/// Errors from codec and contract-registry operations.
///
/// Serialization failures signal a data-format incompatibility, never
/// contention, so callers must not retry them.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The codec could not encode a value.
    #[error("{codec} failed to serialize: {reason}")]
    Serialize { codec: String, reason: String },

    /// The codec could not reconstruct a value from bytes.
    #[error("{codec} failed to deserialize: {reason}")]
    Deserialize { codec: String, reason: String },

    /// A contract name is already bound to another type.
    #[error("contract name already registered: {name} (bound to {existing})")]
    DuplicateContract { name: String, existing: &'static str },

    /// A type already has a contract name.
    #[error("type already registered: {type_name} (as {existing})")]
    DuplicateType { type_name: &'static str, existing: String },

    /// Contract names must be non-empty.
    #[error("contract name for {type_name} must not be empty")]
    EmptyContract { type_name: &'static str },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
