//! Durable state under the data directory: profiles, directory links and the legacy project table.
//!
//! Every read-modify-write cycle takes the advisory lock, re-reads the file it
//! is about to change, and replaces it atomically. Lines the process did not
//! touch are written back byte-for-byte.

mod error;
mod links;
mod profiles;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::fs::{atomic_write, read_optional, FileLock};

pub use error::StoreError;
pub use links::{LinkChange, LinkStore};
pub use profiles::{CorruptLine, MigrationReport, ProfileStore};

#[derive(Debug, Clone, Serialize)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn profiles(&self) -> PathBuf {
        self.root.join("profiles")
    }

    #[must_use]
    pub fn links(&self) -> PathBuf {
        self.root.join("links")
    }

    /// Legacy `basename=username` table, read but never extended.
    #[must_use]
    pub fn projects(&self) -> PathBuf {
        self.root.join("projects")
    }

    #[must_use]
    pub fn lock(&self) -> PathBuf {
        self.root.join(".lock")
    }
}

/// Joins stored lines back into file contents with a trailing newline.
fn render_lines<'a>(lines: impl Iterator<Item = std::borrow::Cow<'a, str>>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn acquire_lock(paths: &StorePaths, timeout: std::time::Duration) -> Result<FileLock, StoreError> {
    let path = paths.lock();
    match FileLock::acquire(&path, timeout) {
        Ok(Some(lock)) => Ok(lock),
        Ok(None) => Err(StoreError::LockTimeout {
            path,
            waited_ms: timeout.as_millis(),
        }),
        Err(err) => Err(StoreError::io(
            format!("failed to lock {}", path.display()),
            err,
        )),
    }
}

fn read_file(path: &Path) -> Result<String, StoreError> {
    read_optional(path)
        .map(Option::unwrap_or_default)
        .map_err(|err| StoreError::io(format!("failed to read {}", path.display()), err))
}

fn write_file(path: &Path, contents: &str) -> Result<(), StoreError> {
    atomic_write(path, contents.as_bytes())
        .map_err(|err| StoreError::io(format!("failed to write {}", path.display()), err))
}
