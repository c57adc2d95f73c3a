//! Queue channels: the raw byte-message side of the transport.

use std::collections::VecDeque;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::ChannelError;

const MESSAGE_EXTENSION: &str = "msg";

/// A queue accepting opaque byte messages up to a fixed size.
pub trait QueueChannel: Send + Sync {
    /// Address of this queue; recorded as the sender of every message.
    fn address(&self) -> &str;

    /// Largest message the queue accepts.
    fn max_message_size(&self) -> usize;

    /// Append one message.
    fn push(&self, message: &[u8]) -> Result<(), ChannelError>;

    /// Create the queue if it does not exist. Idempotent.
    fn ensure_exists(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// An in-process FIFO queue.
///
/// `push` reports a poisoned lock as [`ChannelError::Unavailable`]. The
/// inspection helpers (`pop`, `drain`, `len`) read through poisoning, so
/// they always see the messages actually queued.
#[derive(Debug)]
pub struct InMemoryQueue {
    address: String,
    max_message_size: usize,
    messages: Mutex<VecDeque<Vec<u8>>>,
}

impl InMemoryQueue {
    pub fn new(name: &str, max_message_size: usize) -> Self {
        Self {
            address: format!("memory://{name}"),
            max_message_size,
            messages: Mutex::new(VecDeque::new()),
        }
    }

    /// Remove and return the oldest message.
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.contents().pop_front()
    }

    /// Remove and return every queued message, oldest first.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.contents().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.contents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<Vec<u8>>>, ChannelError> {
        self.messages
            .lock()
            .map_err(|e| ChannelError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn contents(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueChannel for InMemoryQueue {
    fn address(&self) -> &str {
        &self.address
    }

    fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    fn push(&self, message: &[u8]) -> Result<(), ChannelError> {
        if message.len() > self.max_message_size {
            return Err(ChannelError::MessageTooLarge {
                size: message.len(),
                max: self.max_message_size,
            });
        }
        self.lock()?.push_back(message.to_vec());
        Ok(())
    }
}

/// A message read from a [`DirectoryQueue`] but not yet acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedMessage {
    pub seq: u64,
    pub bytes: Vec<u8>,
}

/// A queue spooled to a directory, one file per message.
///
/// Files are named by a zero-padded sequence number, so directory order is
/// queue order. A message is staged in a uniquely named temporary file and
/// linked into its slot without replacing an existing file, so half-written
/// messages never appear and several queues (or processes) may share one
/// directory. A writer that finds its slot taken moves past the highest
/// sequence number on disk.
///
/// Consumers either [`pop`](Self::pop) or [`peek`](Self::peek) then
/// [`ack`](Self::ack). The second form keeps a message queued until its
/// processing succeeded.
#[derive(Debug)]
pub struct DirectoryQueue {
    dir: PathBuf,
    address: String,
    max_message_size: usize,
    next_seq: Mutex<u64>,
}

impl DirectoryQueue {
    /// Open a queue rooted at `dir`. The directory is not created until
    /// [`QueueChannel::ensure_exists`] runs.
    pub fn open(dir: impl Into<PathBuf>, max_message_size: usize) -> Result<Self, ChannelError> {
        let dir = dir.into();
        let next_seq = Self::next_free(&dir)?;
        Ok(Self {
            address: format!("file://{}", dir.display()),
            dir,
            max_message_size,
            next_seq: Mutex::new(next_seq),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Remove and return the oldest message. Concurrent consumers never
    /// receive the same message.
    pub fn pop(&self) -> Result<Option<Vec<u8>>, ChannelError> {
        loop {
            let Some(message) = self.peek()? else {
                return Ok(None);
            };
            if self.ack(message.seq)? {
                return Ok(Some(message.bytes));
            }
            debug!(seq = message.seq, queue = %self.address, "message taken by another consumer");
        }
    }

    /// Read the oldest message without removing it.
    pub fn peek(&self) -> Result<Option<QueuedMessage>, ChannelError> {
        for seq in Self::sequence_numbers(&self.dir)? {
            match fs::read(self.message_path(seq)) {
                Ok(bytes) => return Ok(Some(QueuedMessage { seq, bytes })),
                // removed since the directory scan
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Remove message `seq`. Returns `false` if it was already gone.
    pub fn ack(&self, seq: u64) -> Result<bool, ChannelError> {
        match fs::remove_file(self.message_path(seq)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn len(&self) -> Result<usize, ChannelError> {
        Ok(Self::sequence_numbers(&self.dir)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ChannelError> {
        Ok(self.len()? == 0)
    }

    fn message_path(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("{seq:020}.{MESSAGE_EXTENSION}"))
    }

    fn next_free(dir: &Path) -> Result<u64, ChannelError> {
        Ok(Self::sequence_numbers(dir)?.last().map_or(0, |last| last + 1))
    }

    /// Sorted sequence numbers of the messages in `dir`.
    fn sequence_numbers(dir: &Path) -> Result<Vec<u64>, ChannelError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut seqs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MESSAGE_EXTENSION) {
                continue;
            }
            match path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(seq) => seqs.push(seq),
                None => warn!(path = %path.display(), "skipping unrecognized queue file"),
            }
        }
        seqs.sort_unstable();
        Ok(seqs)
    }
}

impl QueueChannel for DirectoryQueue {
    fn address(&self) -> &str {
        &self.address
    }

    fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    fn push(&self, message: &[u8]) -> Result<(), ChannelError> {
        if message.len() > self.max_message_size {
            return Err(ChannelError::MessageTooLarge {
                size: message.len(),
                max: self.max_message_size,
            });
        }
        let mut next = self
            .next_seq
            .lock()
            .map_err(|e| ChannelError::Unavailable(format!("lock poisoned: {e}")))?;
        let mut staged = tempfile::Builder::new()
            .prefix(".push-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        staged.write_all(message)?;

        let mut seq = *next;
        loop {
            match staged.persist_noclobber(self.message_path(seq)) {
                Ok(_) => {
                    *next = seq + 1;
                    return Ok(());
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    staged = e.file;
                    let taken = seq;
                    seq = (seq + 1).max(Self::next_free(&self.dir)?);
                    debug!(taken, seq, queue = %self.address, "sequence slot in use, moving on");
                }
                Err(e) => return Err(e.error.into()),
            }
        }
    }

    fn ensure_exists(&self) -> Result<(), ChannelError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}
