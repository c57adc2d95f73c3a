//! Per-key atomic read-modify-write over a raw byte key-value store.
//!
//! An [`AtomicContainer`] persists small typed values (counters, cursors,
//! projection state) in a [`BackingMap`] and updates them with optimistic
//! concurrency: read, compute, conditional write, retry on conflict.
//!
//! # Architecture
//!
//! - A [`NamingStrategy`] maps the entity type and key to an entry name.
//! - A [`Codec`](sluice_codec::Codec) turns values into bytes and back.
//! - The [`BackingMap`] provides the only atomic primitives: conditional
//!   insert and version-guarded replace.
//!
//! Atomicity is per key. There are no multi-key transactions.
//!
//! # Modules
//!
//! - [`error`]: Error types for atomic operations
//! - [`types`]: [`Version`], [`CasOutcome`], [`AddOrUpdateHint`]
//! - [`traits`]: The [`BackingMap`] trait
//! - [`names`]: Naming strategies and key rendering
//! - [`memory`]: In-memory [`InMemoryBackingMap`]
//! - [`container`]: The typed [`AtomicContainer`]

pub mod container;
pub mod error;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use container::AtomicContainer;
pub use error::{AtomicError, Result};
pub use memory::InMemoryBackingMap;
pub use names::{short_type_name, validate_key_text, AtomicKey, DefaultNamingStrategy, NamingStrategy};
pub use traits::BackingMap;
pub use types::{AddOrUpdateHint, CasOutcome, Version, Versioned};
