//! Backup destinations
//!
//! A [`Destination`] couples a storage [`Disk`] with a backup name. Every object
//! it lists or writes lives below the sanitized backup name. Listing goes
//! through the destination so that an unreachable backend degrades to an empty
//! [`BackupInventory`] instead of an error.

mod inventory;
mod record;

pub use inventory::BackupInventory;
pub use record::{is_archive, BackupRecord, ARCHIVE_EXTENSION};

use crate::storage::{Disk, DiskRegistry, StorageError};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Errors raised by destination operations, tagged with the destination
#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("Disk '{disk_name}' is not configured")]
    UnknownDisk { disk_name: String },

    #[error("Failed to list backups of '{backup_name}' on disk '{disk_name}': {source}")]
    List {
        disk_name: String,
        backup_name: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to write '{path}' for '{backup_name}' to disk '{disk_name}': {source}")]
    Write {
        disk_name: String,
        backup_name: String,
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to delete '{path}' of '{backup_name}' on disk '{disk_name}': {source}")]
    Delete {
        disk_name: String,
        backup_name: String,
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to open {path:?} for upload to disk '{disk_name}': {source}")]
    Open {
        disk_name: String,
        backup_name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Refusing to upload {path:?} to disk '{disk_name}': not a .zip archive")]
    NotAnArchive {
        disk_name: String,
        backup_name: String,
        path: PathBuf,
    },
}

impl DestinationError {
    pub fn disk_name(&self) -> &str {
        match self {
            Self::UnknownDisk { disk_name }
            | Self::List { disk_name, .. }
            | Self::Write { disk_name, .. }
            | Self::Delete { disk_name, .. }
            | Self::Open { disk_name, .. }
            | Self::NotAnArchive { disk_name, .. } => disk_name,
        }
    }
}

pub type Result<T> = std::result::Result<T, DestinationError>;

/// Replace every byte that is not an ASCII alphanumeric or a dot with `-`.
///
/// Multi-byte characters become one `-` per UTF-8 byte, so `café` maps to
/// `caf--`.
pub fn sanitize_backup_name(name: &str) -> String {
    name.bytes()
        .map(|b| if b.is_ascii_alphanumeric() || b == b'.' { char::from(b) } else { '-' })
        .collect()
}

/// A name that sanitizes to dots only would address the disk root or its parent
pub fn is_unusable_backup_name(name: &str) -> bool {
    sanitize_backup_name(name).bytes().all(|b| b == b'.')
}

/// A backup name bound to one storage disk
#[derive(Debug)]
pub struct Destination {
    disk: Arc<dyn Disk>,
    disk_name: String,
    backup_name: String,
    connection_error: Mutex<Option<String>>,
}

impl Destination {
    pub fn new(disk: Arc<dyn Disk>, disk_name: &str, backup_name: &str) -> Self {
        Self {
            disk,
            disk_name: disk_name.to_string(),
            backup_name: sanitize_backup_name(backup_name),
            connection_error: Mutex::new(None),
        }
    }

    /// Resolve `disk_name` in the registry
    pub fn create(registry: &DiskRegistry, disk_name: &str, backup_name: &str) -> Result<Self> {
        let disk = registry
            .get(disk_name)
            .ok_or_else(|| DestinationError::UnknownDisk {
                disk_name: disk_name.to_string(),
            })?;
        Ok(Self::new(disk, disk_name, backup_name))
    }

    pub fn disk_name(&self) -> &str {
        &self.disk_name
    }

    pub fn backup_name(&self) -> &str {
        &self.backup_name
    }

    pub fn disk(&self) -> &Arc<dyn Disk> {
        &self.disk
    }

    /// Error captured by the last failed listing, cleared by a successful one
    pub fn connection_error(&self) -> Option<String> {
        self.connection_error.lock().clone()
    }

    /// Check the backend by listing the backups
    pub fn is_reachable(&self) -> bool {
        self.list_inventory().is_ok()
    }

    /// Current inventory, empty when the backend cannot be listed
    pub fn get_backups(&self) -> BackupInventory {
        self.list_inventory().unwrap_or_default()
    }

    /// Current inventory, failing when the backend cannot be listed
    pub fn try_get_backups(&self) -> Result<BackupInventory> {
        self.list_inventory().map_err(|source| DestinationError::List {
            disk_name: self.disk_name.clone(),
            backup_name: self.backup_name.clone(),
            source,
        })
    }

    fn list_inventory(&self) -> std::result::Result<BackupInventory, StorageError> {
        match self.disk.list_with_metadata(&self.backup_name) {
            Ok(entries) => {
                *self.connection_error.lock() = None;
                Ok(BackupInventory::from_entries(Arc::clone(&self.disk), entries))
            }
            Err(e) => {
                warn!(
                    "Disk '{}' unreachable for '{}': {}",
                    self.disk_name, self.backup_name, e
                );
                *self.connection_error.lock() = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Bytes used by this backup, 0 when unreachable
    pub fn used_storage(&self) -> u64 {
        match self.get_backups().size() {
            Ok(size) => size,
            Err(e) => {
                warn!(
                    "Could not size backups of '{}' on '{}': {}",
                    self.backup_name, self.disk_name, e
                );
                0
            }
        }
    }

    /// Object path an uploaded file ends up at
    pub fn object_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.backup_name, file_name)
    }

    /// Stream a local archive to `<backup name>/<file name>`
    pub fn write(&self, local_path: &Path) -> Result<u64> {
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| is_archive(n))
            .ok_or_else(|| DestinationError::NotAnArchive {
                disk_name: self.disk_name.clone(),
                backup_name: self.backup_name.clone(),
                path: local_path.to_path_buf(),
            })?;

        let file = File::open(local_path).map_err(|source| DestinationError::Open {
            disk_name: self.disk_name.clone(),
            backup_name: self.backup_name.clone(),
            path: local_path.to_path_buf(),
            source,
        })?;

        let object_path = self.object_path(&file_name);
        debug!("Uploading {:?} to {}:{}", local_path, self.disk_name, object_path);

        let mut reader = BufReader::new(file);
        let written = self
            .disk
            .write_stream(&object_path, &mut reader)
            .map_err(|source| DestinationError::Write {
                disk_name: self.disk_name.clone(),
                backup_name: self.backup_name.clone(),
                path: object_path.clone(),
                source,
            })?;

        info!("Copied {} bytes to {}:{}", written, self.disk_name, object_path);
        Ok(written)
    }

    pub fn delete(&self, record: &BackupRecord) -> Result<()> {
        record.delete().map_err(|source| DestinationError::Delete {
            disk_name: self.disk_name.clone(),
            backup_name: self.backup_name.clone(),
            path: record.path().to_string(),
            source,
        })
    }
}

/// One destination per disk name, in the given order
pub fn create_destinations(
    registry: &DiskRegistry,
    backup_name: &str,
    disk_names: &[String],
) -> Result<Vec<Arc<Destination>>> {
    disk_names
        .iter()
        .map(|disk_name| Destination::create(registry, disk_name, backup_name).map(Arc::new))
        .collect()
}
