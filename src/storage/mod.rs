//! Storage backend abstraction
//!
//! A destination only ever talks to a [`Disk`]: a narrow capability with
//! `list`, `stat`, `exists`, `delete` and `write_stream`. One implementation
//! exists per supported backend; the [`mock`] module provides an in-memory
//! disk for tests.
//!
//! Paths are backend-relative and `/`-separated (`my-site.com/2024-01-01.zip`).

pub mod local;
pub mod mock;

use crate::config::{DiskConfig, DiskType};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

pub use local::LocalDisk;

/// Errors returned by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Operation on '{path}' rejected: {reason}")]
    Rejected { path: String, reason: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound(path.into());
        }
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata reported by a backend for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// A listed object together with the metadata the listing returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path: String,
    pub meta: ObjectMeta,
}

/// Capability interface every storage backend implements
pub trait Disk: Send + Sync + fmt::Debug {
    /// Short backend type name (for display)
    fn kind(&self) -> &'static str;

    /// Recursively list every object below `prefix`
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Fetch last-modified time and size of one object
    fn stat(&self, path: &str) -> Result<ObjectMeta>;

    /// Whether the object exists. "Not found" is `Ok(false)`, never an error.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Delete an object. Deleting a missing object is not an error.
    fn delete(&self, path: &str) -> Result<()>;

    /// Stream `source` into the object at `path`, returning the bytes written
    fn write_stream(&self, path: &str, source: &mut dyn Read) -> Result<u64>;

    /// List objects together with their metadata.
    ///
    /// The default issues one `stat` per listed object; backends whose listing
    /// call already returns metadata should override it.
    fn list_with_metadata(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        self.list(prefix)?
            .into_iter()
            .map(|path| {
                let meta = self.stat(&path)?;
                Ok(ObjectEntry { path, meta })
            })
            .collect()
    }
}

/// Resolves configured disk names to shared backend handles
#[derive(Debug, Clone, Default)]
pub struct DiskRegistry {
    disks: HashMap<String, Arc<dyn Disk>>,
}

impl DiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `[disks]` configuration section
    pub fn from_config(disks: &HashMap<String, DiskConfig>) -> Self {
        let mut registry = Self::new();

        for (name, disk) in disks {
            let handle: Arc<dyn Disk> = match disk.disk_type {
                DiskType::Local => {
                    Arc::new(LocalDisk::new(crate::config::expand_tilde(&disk.root)))
                }
            };
            registry.disks.insert(name.clone(), handle);
        }

        registry
    }

    /// Register (or replace) a disk handle under `name`
    pub fn with_disk(mut self, name: &str, disk: Arc<dyn Disk>) -> Self {
        self.disks.insert(name.to_string(), disk);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Disk>> {
        self.disks.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.disks.keys().map(String::as_str)
    }
}
