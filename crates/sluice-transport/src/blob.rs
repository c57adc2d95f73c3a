//! Blob containers holding overflowed messages.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sluice_types::ReferenceId;

use crate::error::BlobError;

/// Named blob storage. A blob is written once under its reference id and
/// read back by the receiver.
pub trait BlobStore: Send + Sync {
    /// Location of the container; recorded in every reference record.
    fn location(&self) -> &str;

    /// Store `bytes` under `name`, replacing any previous blob.
    fn upload(&self, name: &ReferenceId, bytes: &[u8]) -> Result<(), BlobError>;

    /// Fetch a blob. `Ok(None)` if it does not exist.
    fn download(&self, name: &ReferenceId) -> Result<Option<Vec<u8>>, BlobError>;

    /// Create the container if it does not exist. Idempotent.
    fn ensure_exists(&self) -> Result<(), BlobError> {
        Ok(())
    }
}

/// An in-process container.
///
/// Trait operations report a poisoned lock as [`BlobError::Unavailable`];
/// the inspection helpers (`len`, `names`, `total_bytes`) read through it.
#[derive(Debug)]
pub struct InMemoryBlobContainer {
    location: String,
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobContainer {
    pub fn new(name: &str) -> Self {
        Self {
            location: format!("memory://{name}"),
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.contents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blob names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.contents().keys().cloned().collect()
    }

    pub fn total_bytes(&self) -> usize {
        self.contents().values().map(Vec::len).sum()
    }

    fn contents(&self) -> RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>, BlobError> {
        self.blobs
            .read()
            .map_err(|e| BlobError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>, BlobError> {
        self.blobs
            .write()
            .map_err(|e| BlobError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl BlobStore for InMemoryBlobContainer {
    fn location(&self) -> &str {
        &self.location
    }

    fn upload(&self, name: &ReferenceId, bytes: &[u8]) -> Result<(), BlobError> {
        self.write()?
            .insert(name.as_str().to_string(), bytes.to_vec());
        Ok(())
    }

    fn download(&self, name: &ReferenceId) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self.read()?.get(name.as_str()).cloned())
    }
}

/// A container backed by a directory, one file per blob.
///
/// Uploads are staged in a uniquely named temporary file and renamed over
/// the blob, so readers see either nothing or the complete blob.
#[derive(Debug)]
pub struct DirectoryBlobContainer {
    dir: PathBuf,
    location: String,
}

impl DirectoryBlobContainer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            location: format!("file://{}", dir.display()),
            dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, name: &ReferenceId) -> Result<PathBuf, BlobError> {
        let name = name.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(BlobError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

impl BlobStore for DirectoryBlobContainer {
    fn location(&self) -> &str {
        &self.location
    }

    fn upload(&self, name: &ReferenceId, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.blob_path(name)?;
        let mut staged = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        staged.write_all(bytes)?;
        staged.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn download(&self, name: &ReferenceId) -> Result<Option<Vec<u8>>, BlobError> {
        match fs::read(self.blob_path(name)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_exists(&self) -> Result<(), BlobError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}
