use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use fs4::FileExt;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Replaces `path` with `contents` via a synced temp file renamed over it.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    atomic_write_with(path, contents, |_| Ok(()))
}

/// Like [`atomic_write`], running `before_persist` between the temp write and the rename.
///
/// An error from the hook abandons the write: the temp file is removed and
/// `path` keeps its previous contents.
pub(crate) fn atomic_write_with(
    path: &Path,
    contents: &[u8],
    before_persist: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync temp file for {}", path.display()))?;
    before_persist(tmp.path())?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    sync_dir(parent);
    trace!(path = %path.display(), bytes = contents.len(), "atomic write");
    Ok(())
}

/// Failures are logged; the rename has already landed.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    match File::open(dir).and_then(|handle| handle.sync_all()) {
        Ok(()) => {}
        Err(err) => debug!(dir = %dir.display(), %err, "directory sync failed"),
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Reads a file that may legitimately not exist yet.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Advisory exclusive lock held until dropped.
#[derive(Debug)]
pub(crate) struct FileLock {
    _file: File,
}

impl FileLock {
    pub(crate) fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            #[cfg(windows)]
            Err(err) if matches!(err.raw_os_error(), Some(32 | 33)) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to lock {}", path.display())),
        }
    }

    /// Polls for the lock until `timeout` elapses; `None` means another process kept it.
    pub(crate) fn acquire(path: &Path, timeout: Duration) -> Result<Option<Self>> {
        let started = Instant::now();
        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                return Ok(Some(lock));
            }
            if started.elapsed() >= timeout {
                debug!(path = %path.display(), ?timeout, "lock wait expired");
                return Ok(None);
            }
            thread::sleep(LOCK_POLL_INTERVAL.min(timeout));
        }
    }
}
