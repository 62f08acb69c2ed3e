//! File-based locking to prevent overlapping runs on the same backup

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lock file for one backup name
///
/// The lock is held as long as the guard returned by
/// [`try_acquire`](Self::try_acquire) lives.
pub struct RunLock {
    lock: RwLock<File>,
    lock_path: PathBuf,
    name: String,
}

impl RunLock {
    /// Open (or create) the lock file for `name` in `directory`
    pub fn open(directory: &Path, name: &str) -> Result<Self> {
        let lock_path = Self::lock_path(directory, name);
        debug!("Opening lock file: {:?}", lock_path);

        std::fs::create_dir_all(directory).context("Failed to create lock directory")?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        Ok(Self {
            lock: RwLock::new(file),
            lock_path,
            name: name.to_string(),
        })
    }

    /// Take the exclusive lock, failing if another run holds it
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>> {
        let guard = self.lock.try_write().with_context(|| {
            format!("Backup '{}' is already being processed (lock held)", self.name)
        })?;
        info!("Acquired run lock for backup: {}", self.name);
        Ok(guard)
    }

    fn lock_path(directory: &Path, name: &str) -> PathBuf {
        directory.join(format!("backup-keeper-{}.lock", name))
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}
