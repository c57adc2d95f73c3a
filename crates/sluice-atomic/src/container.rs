//! [`AtomicContainer`]: typed, per-key read-modify-write over a
//! [`BackingMap`].

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sluice_codec::Codec;
use tracing::{debug, trace};

use crate::error::{AtomicError, Result};
use crate::names::{short_type_name, validate_key_text, AtomicKey, NamingStrategy};
use crate::traits::BackingMap;
use crate::types::{AddOrUpdateHint, CasOutcome};

/// Typed view of one entity type inside a backing map.
///
/// Updates are optimistic: each attempt reads the entry, computes the new
/// value, and writes it back with a conditional write. A lost race discards
/// the attempt and starts over from a fresh read. No lock is held between
/// the read and the write.
///
/// # Caller obligation
///
/// The `add` and `update` closures may run more than once for a single
/// logical call when writers contend for the same key. They must be free of
/// externally visible side effects.
pub struct AtomicContainer<K: ?Sized, V, C> {
    map: Arc<dyn BackingMap>,
    naming: Arc<dyn NamingStrategy>,
    codec: Arc<C>,
    entity: String,
    folder: String,
    _marker: PhantomData<fn(&K) -> V>,
}

impl<K, V, C> AtomicContainer<K, V, C>
where
    K: AtomicKey + ?Sized,
    V: Serialize + DeserializeOwned + 'static,
    C: Codec,
{
    pub fn new(map: Arc<dyn BackingMap>, naming: Arc<dyn NamingStrategy>, codec: Arc<C>) -> Self {
        let entity = short_type_name::<V>();
        let folder = naming.folder(&entity, &short_type_name::<K>());
        Self {
            map,
            naming,
            codec,
            entity,
            folder,
            _marker: PhantomData,
        }
    }

    /// Folder holding every entry of this container.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Full entry name for `key`.
    pub fn entry_name(&self, key: &K) -> Result<String> {
        let text = key.storage_key();
        validate_key_text(&text)?;
        Ok(format!("{}/{}", self.folder, self.naming.name(&self.entity, &text)))
    }

    /// Read the value stored under `key`. Never mutates the map.
    ///
    /// Returns `Ok(None)` if no entry exists.
    pub fn try_get(&self, key: &K) -> Result<Option<V>> {
        let name = self.entry_name(key)?;
        match self.map.get(&name)? {
            Some(entry) => Ok(Some(self.codec.from_bytes(&entry.bytes)?)),
            None => Ok(None),
        }
    }

    /// Atomically create or transform the value under `key`.
    ///
    /// If no entry exists, stores `add()`; otherwise stores `update(old)`.
    /// Returns the stored value. Conflicting writers cause the attempt to be
    /// retried, so either closure may run several times. Codec failures
    /// abort immediately without retry.
    pub fn add_or_update<A, U>(
        &self,
        key: &K,
        add: A,
        update: U,
        hint: AddOrUpdateHint,
    ) -> Result<V>
    where
        A: Fn() -> V,
        U: Fn(V) -> V,
    {
        let name = self.entry_name(key)?;
        let mut skip_read = hint == AddOrUpdateHint::LikelyInsert;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let current = if skip_read {
                skip_read = false;
                None
            } else {
                self.map.get(&name)?
            };

            let (value, outcome) = match current {
                None => {
                    let value = add();
                    let bytes = self.codec.to_bytes(&value)?;
                    (value, self.map.insert_if_absent(&name, bytes)?)
                }
                Some(existing) => {
                    let old: V = self.codec.from_bytes(&existing.bytes)?;
                    let value = update(old);
                    let bytes = self.codec.to_bytes(&value)?;
                    (
                        value,
                        self.map.replace_if_version(&name, existing.version, bytes)?,
                    )
                }
            };

            match outcome {
                CasOutcome::Committed(version) => {
                    trace!(entry = %name, %version, attempt, "entry committed");
                    return Ok(value);
                }
                CasOutcome::Conflict => {
                    debug!(entry = %name, attempt, "conditional write lost a race; retrying");
                }
            }
        }
    }

    /// Remove the entry under `key`.
    ///
    /// Returns `Ok(true)` if something was removed, `Ok(false)` otherwise.
    pub fn try_delete(&self, key: &K) -> Result<bool> {
        let name = self.entry_name(key)?;
        self.map.remove(&name)
    }

    /// Transform an existing value, failing with [`AtomicError::NotFound`]
    /// if there is none.
    pub fn update_existing<U>(&self, key: &K, update: U) -> Result<V>
    where
        U: Fn(V) -> V,
    {
        let name = self.entry_name(key)?;
        loop {
            let existing = self
                .map
                .get(&name)?
                .ok_or_else(|| AtomicError::NotFound { name: name.clone() })?;
            let old: V = self.codec.from_bytes(&existing.bytes)?;
            let value = update(old);
            let bytes = self.codec.to_bytes(&value)?;
            match self.map.replace_if_version(&name, existing.version, bytes)? {
                CasOutcome::Committed(_) => return Ok(value),
                CasOutcome::Conflict => {
                    debug!(entry = %name, "conditional write lost a race; retrying");
                }
            }
        }
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn put(&self, key: &K, value: V) -> Result<V>
    where
        V: Clone,
    {
        self.add_or_update(key, || value.clone(), |_| value.clone(), AddOrUpdateHint::Unspecified)
    }

    /// The stored value, or `V::default()` when absent. Does not store the
    /// default.
    pub fn get_or_default(&self, key: &K) -> Result<V>
    where
        V: Default,
    {
        Ok(self.try_get(key)?.unwrap_or_default())
    }

    /// Names of all entries in this container's folder, sorted.
    pub fn entry_names(&self) -> Result<Vec<String>> {
        self.map.names(&format!("{}/", self.folder))
    }
}

impl<K: ?Sized, V, C> Clone for AtomicContainer<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
            naming: Arc::clone(&self.naming),
            codec: Arc::clone(&self.codec),
            entity: self.entity.clone(),
            folder: self.folder.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K: ?Sized, V, C> std::fmt::Debug for AtomicContainer<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicContainer")
            .field("entity", &self.entity)
            .field("folder", &self.folder)
            .finish()
    }
}
