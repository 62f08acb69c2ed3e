use crate::storage::{Disk, ObjectMeta, StorageError};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// File extension every backup archive carries
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Whether a backend path names a backup archive
pub fn is_archive(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|ext| ext == ARCHIVE_EXTENSION)
        .unwrap_or(false)
}

/// One archive on a destination.
///
/// The timestamp is the last-modified time reported when the inventory was
/// listed. Size and existence are asked of the backend again on demand.
#[derive(Clone)]
pub struct BackupRecord {
    path: String,
    disk: Arc<dyn Disk>,
    meta: ObjectMeta,
}

impl BackupRecord {
    pub(crate) fn new(path: String, disk: Arc<dyn Disk>, meta: ObjectMeta) -> Self {
        Self { path, disk, meta }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.meta.last_modified
    }

    /// Size as reported by the listing, without a backend round-trip
    pub fn listed_size(&self) -> u64 {
        self.meta.size
    }

    pub fn exists(&self) -> Result<bool, StorageError> {
        self.disk.exists(&self.path)
    }

    /// Current size in bytes, 0 once the object is gone
    pub fn size(&self) -> Result<u64, StorageError> {
        if !self.exists()? {
            return Ok(0);
        }

        match self.disk.stat(&self.path) {
            Ok(meta) => Ok(meta.size),
            // Removed between the two calls
            Err(StorageError::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub fn delete(&self) -> Result<(), StorageError> {
        self.disk.delete(&self.path)?;
        info!("Deleted backup {}", self.path);
        Ok(())
    }
}

impl fmt::Debug for BackupRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupRecord")
            .field("path", &self.path)
            .field("disk", &self.disk.kind())
            .field("timestamp", &self.meta.last_modified)
            .field("size", &self.meta.size)
            .finish()
    }
}

impl PartialEq for BackupRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && Arc::ptr_eq(&self.disk, &other.disk)
    }
}

impl Eq for BackupRecord {}
