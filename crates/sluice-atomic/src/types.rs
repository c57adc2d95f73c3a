//! Core types shared by backing maps and containers.

use std::fmt;

/// Opaque version token assigned by a [`BackingMap`](crate::BackingMap) on
/// every successful write.
///
/// Tokens are never reused within one map, so a value that was removed and
/// re-inserted does not match a token observed before the removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(pub u64);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Raw entry bytes together with the version they were read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned {
    pub version: Version,
    pub bytes: Vec<u8>,
}

/// Result of a conditional write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write was applied; the entry now carries this version.
    Committed(Version),
    /// Another writer got there first; nothing was written.
    Conflict,
}

impl CasOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Caller's expectation for an `add_or_update` call.
///
/// The hint never changes the result. [`LikelyInsert`](Self::LikelyInsert)
/// makes the first attempt an optimistic insert without reading the entry;
/// the other variants read first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddOrUpdateHint {
    LikelyInsert,
    LikelyUpdate,
    #[default]
    Unspecified,
}
