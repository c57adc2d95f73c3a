//! The [`BackingMap`] trait: the raw byte store under an atomic container.

use crate::error::Result;
use crate::types::{CasOutcome, Version, Versioned};

/// A string-keyed map of raw bytes with conditional writes.
///
/// Implementations must be thread-safe (`Send + Sync`). The conditional
/// writes are the only primitives containers rely on for atomicity: each
/// must check its precondition and apply the write as one indivisible step.
/// Containers hold no locks of their own.
///
/// A durable backend can implement the same contract with a version column
/// or an ETag and a guarded write.
pub trait BackingMap: Send + Sync {
    /// Read an entry and the version it is currently at.
    ///
    /// Returns `Ok(None)` if the entry does not exist.
    fn get(&self, name: &str) -> Result<Option<Versioned>>;

    /// Create the entry only if no entry exists under `name`.
    fn insert_if_absent(&self, name: &str, bytes: Vec<u8>) -> Result<CasOutcome>;

    /// Overwrite the entry only if it is still at `expected`.
    ///
    /// Returns [`CasOutcome::Conflict`] if the entry changed or was removed.
    fn replace_if_version(&self, name: &str, expected: Version, bytes: Vec<u8>)
        -> Result<CasOutcome>;

    /// Remove an entry.
    ///
    /// Returns `Ok(true)` if the entry existed and was removed, `Ok(false)`
    /// if it did not exist.
    fn remove(&self, name: &str) -> Result<bool>;

    /// List all entry names starting with `prefix`, sorted.
    fn names(&self, prefix: &str) -> Result<Vec<String>>;

    /// Returns `true` if an entry exists under `name`.
    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }
}
