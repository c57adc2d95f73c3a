use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("envelope is missing the {0} attribute")]
    MissingAttribute(&'static str),

    #[error("envelope attribute {0} was set more than once")]
    DuplicateAttribute(&'static str),

    #[error("malformed reference id: {0}")]
    InvalidReferenceId(String),
}
