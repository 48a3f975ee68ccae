//! File-backed, lock-protected access to the task collection.
//!
//! Every operation runs as one transaction: take the in-process lock and an
//! advisory lock on a sibling `.{name}.lock` file, obtain the current
//! collection, apply a single logical change to a working copy, write it
//! atomically, and only then publish it. A failure anywhere discards the
//! working copy, so nothing partial is ever persisted. The file lock makes
//! separate processes on the same file take turns as well.

use crate::error::{Error, Result};
use crate::tasks::TaskStore;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How the shared store treats the backing file between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Keep the decoded collection and reuse it while the file still holds
    /// the bytes it was decoded from.
    #[default]
    Cached,
    /// Decode the file at the start of every operation.
    ReloadEveryOperation,
}

/// Write `contents` to `path` so that readers see either the old file or the
/// complete new one.
///
/// The data goes to a uniquely named hidden sibling that is synced and then
/// renamed over the destination.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let file_name = path.file_name().map_or_else(|| "data".into(), |n| n.to_string_lossy());
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;
    temp.write_all(contents).map_err(|e| Error::io(temp.path(), e))?;
    temp.as_file().sync_all().map_err(|e| Error::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."))
}

/// Advisory lock on the sibling `.{name}.lock` file, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path, exclusive: bool) -> Result<Self> {
        let dir = parent_dir(path);
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let file_name = path.file_name().map_or_else(|| "data".into(), |n| n.to_string_lossy());
        let lock_path = dir.join(format!(".{file_name}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::io(&lock_path, e))?;

        let locked = if exclusive { file.lock_exclusive() } else { file.lock_shared() };
        locked.map_err(|e| Error::io(&lock_path, e))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "failed to release task file lock");
        }
    }
}

/// A decoded collection and the file bytes it came from (`None`: no file).
#[derive(Debug)]
struct Snapshot {
    tasks: TaskStore,
    contents: Option<Vec<u8>>,
}

/// The task collection shared by every caller in the process.
///
/// Pass one instance (usually behind an `Arc`) to whatever serves requests.
/// Instances in other threads or processes that use the same file are
/// serialized through the file lock.
#[derive(Debug)]
pub struct SharedTaskStore {
    path: PathBuf,
    policy: LoadPolicy,
    cached: Mutex<Option<Snapshot>>,
}

impl SharedTaskStore {
    /// Create a shared store backed by `path`. Nothing is read until the
    /// first operation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, policy: LoadPolicy) -> Self {
        Self { path: path.into(), policy, cached: Mutex::new(None) }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configured load policy.
    #[must_use]
    pub const fn policy(&self) -> LoadPolicy {
        self.policy
    }

    /// Run a read-only operation against the current collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be locked or loaded.
    pub fn read<T>(&self, f: impl FnOnce(&TaskStore) -> T) -> Result<T> {
        let mut guard = self.lock();
        let _file_lock = FileLock::acquire(&self.path, false)?;
        let current = self.current(&mut guard)?;
        Ok(f(current))
    }

    /// Run one logical mutation and persist it.
    ///
    /// `f` works on a copy of the collection. The copy is written to disk
    /// and published only if `f` succeeds and the write succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error from locking, from loading, from `f`, or from
    /// writing.
    pub fn transact<T>(&self, f: impl FnOnce(&mut TaskStore) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let _file_lock = FileLock::acquire(&self.path, true)?;
        let mut working = self.current(&mut guard)?.clone();

        let value = f(&mut working)?;
        let contents = working.encode(&self.path)?;
        write_atomic(&self.path, &contents)?;
        tracing::debug!(path = %self.path.display(), tasks = working.len(), "stored tasks");
        *guard = Some(Snapshot { tasks: working, contents: Some(contents) });
        Ok(value)
    }

    /// Drop the in-memory copy so the next operation decodes the file again.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Snapshot>> {
        // The cached value is only ever replaced wholesale after a successful
        // write, so a poisoned guard still holds a consistent collection.
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The collection as the file currently describes it. Must be called
    /// with the file lock held.
    fn current<'a>(&self, slot: &'a mut Option<Snapshot>) -> Result<&'a TaskStore> {
        let contents = self.read_file()?;
        let snapshot = match slot.take() {
            Some(cached) if self.policy == LoadPolicy::Cached && cached.contents == contents => {
                cached
            }
            _ => Snapshot { tasks: self.decode(contents.as_deref())?, contents },
        };
        Ok(&slot.insert(snapshot).tasks)
    }

    fn read_file(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn decode(&self, contents: Option<&[u8]>) -> Result<TaskStore> {
        contents.map_or_else(
            || {
                tracing::debug!(path = %self.path.display(), "no task file yet, starting empty");
                Ok(TaskStore::new())
            },
            |bytes| TaskStore::decode(&self.path, bytes),
        )
    }
}
