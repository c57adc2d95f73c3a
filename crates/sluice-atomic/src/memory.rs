//! In-memory backing map for tests and single-process state.
//!
//! [`InMemoryBackingMap`] stores all entries in a `HashMap` protected by a
//! `RwLock`. Each conditional write checks its precondition and applies the
//! write under one write-lock acquisition, which makes it atomic.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{AtomicError, Result};
use crate::traits::BackingMap;
use crate::types::{CasOutcome, Version, Versioned};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Versioned>,
    next_version: u64,
}

impl Inner {
    fn bump(&mut self) -> Version {
        self.next_version += 1;
        Version(self.next_version)
    }
}

/// An in-memory implementation of [`BackingMap`].
///
/// Data is lost when the map is dropped. Share one instance between
/// containers with `Arc`.
///
/// [`BackingMap`] operations fail with [`AtomicError::Backend`] once the
/// lock is poisoned; [`len`](Self::len) and [`is_empty`](Self::is_empty)
/// still count the stored entries.
#[derive(Debug, Default)]
pub struct InMemoryBackingMap {
    inner: RwLock<Inner>,
}

impl InMemoryBackingMap {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| AtomicError::Backend(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| AtomicError::Backend(format!("lock poisoned: {e}")))
    }
}

impl BackingMap for InMemoryBackingMap {
    fn get(&self, name: &str) -> Result<Option<Versioned>> {
        Ok(self.read()?.entries.get(name).cloned())
    }

    fn insert_if_absent(&self, name: &str, bytes: Vec<u8>) -> Result<CasOutcome> {
        let mut inner = self.write()?;
        if inner.entries.contains_key(name) {
            return Ok(CasOutcome::Conflict);
        }
        let version = inner.bump();
        inner
            .entries
            .insert(name.to_string(), Versioned { version, bytes });
        Ok(CasOutcome::Committed(version))
    }

    fn replace_if_version(
        &self,
        name: &str,
        expected: Version,
        bytes: Vec<u8>,
    ) -> Result<CasOutcome> {
        let mut inner = self.write()?;
        match inner.entries.get(name) {
            Some(current) if current.version == expected => {}
            _ => return Ok(CasOutcome::Conflict),
        }
        let version = inner.bump();
        inner
            .entries
            .insert(name.to_string(), Versioned { version, bytes });
        Ok(CasOutcome::Committed(version))
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.write()?.entries.remove(name).is_some())
    }

    fn names(&self, prefix: &str) -> Result<Vec<String>> {
        let inner = self.read()?;
        let mut names: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn read_nonexistent_returns_none() {
        let map = InMemoryBackingMap::new();
        assert!(map.get("atomic-x/nope.bin").unwrap().is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn insert_if_absent_only_once() {
        let map = InMemoryBackingMap::new();
        let first = map.insert_if_absent("k", b"one".to_vec()).unwrap();
        assert!(first.is_committed());
        let second = map.insert_if_absent("k", b"two".to_vec()).unwrap();
        assert_eq!(second, CasOutcome::Conflict);
        assert_eq!(map.get("k").unwrap().unwrap().bytes, b"one");
    }

    #[test]
    fn replace_requires_matching_version() {
        let map = InMemoryBackingMap::new();
        let CasOutcome::Committed(v1) = map.insert_if_absent("k", b"one".to_vec()).unwrap() else {
            panic!("insert should commit");
        };

        let stale = Version(v1.0 + 100);
        assert_eq!(
            map.replace_if_version("k", stale, b"bad".to_vec()).unwrap(),
            CasOutcome::Conflict
        );

        let outcome = map.replace_if_version("k", v1, b"two".to_vec()).unwrap();
        let CasOutcome::Committed(v2) = outcome else {
            panic!("replace should commit");
        };
        assert!(v2 > v1);

        // The old token is spent.
        assert_eq!(
            map.replace_if_version("k", v1, b"three".to_vec()).unwrap(),
            CasOutcome::Conflict
        );
        assert_eq!(map.get("k").unwrap().unwrap().bytes, b"two");
    }

    #[test]
    fn replace_of_missing_entry_conflicts() {
        let map = InMemoryBackingMap::new();
        assert_eq!(
            map.replace_if_version("k", Version(1), b"x".to_vec()).unwrap(),
            CasOutcome::Conflict
        );
        assert!(!map.contains("k").unwrap());
    }

    #[test]
    fn versions_not_reused_after_remove() {
        let map = InMemoryBackingMap::new();
        let CasOutcome::Committed(v1) = map.insert_if_absent("k", b"a".to_vec()).unwrap() else {
            panic!("insert should commit");
        };
        assert!(map.remove("k").unwrap());
        let CasOutcome::Committed(v2) = map.insert_if_absent("k", b"b".to_vec()).unwrap() else {
            panic!("insert should commit");
        };
        assert_ne!(v1, v2);
        assert_eq!(
            map.replace_if_version("k", v1, b"c".to_vec()).unwrap(),
            CasOutcome::Conflict
        );
    }

    #[test]
    fn remove_reports_presence() {
        let map = InMemoryBackingMap::new();
        map.insert_if_absent("k", vec![1]).unwrap();
        assert!(map.remove("k").unwrap());
        assert!(!map.remove("k").unwrap());
    }

    #[test]
    fn names_filtered_and_sorted() {
        let map = InMemoryBackingMap::new();
        map.insert_if_absent("atomic-b/2.bin", vec![]).unwrap();
        map.insert_if_absent("atomic-a/1.bin", vec![]).unwrap();
        map.insert_if_absent("atomic-b/1.bin", vec![]).unwrap();

        assert_eq!(
            map.names("atomic-b/").unwrap(),
            vec!["atomic-b/1.bin", "atomic-b/2.bin"]
        );
        assert_eq!(map.names("").unwrap().len(), 3);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn poisoned_lock_fails_operations_but_still_counts() {
        let map = Arc::new(InMemoryBackingMap::new());
        map.insert_if_absent("atomic-a/1.bin", vec![1]).unwrap();
        let holder = Arc::clone(&map);
        let _ = thread::spawn(move || {
            let _guard = holder.inner.write().unwrap();
            panic!("writer died holding the map lock");
        })
        .join();

        assert!(matches!(
            map.get("atomic-a/1.bin").unwrap_err(),
            AtomicError::Backend(_)
        ));
        assert!(matches!(
            map.insert_if_absent("atomic-a/2.bin", vec![]).unwrap_err(),
            AtomicError::Backend(_)
        ));
        assert_eq!(map.len(), 1);
        assert!(!map.is_empty());
    }
}
