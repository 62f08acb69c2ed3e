//! In-memory disk for testing
//! Available for use in external test crates

use super::{Disk, ObjectMeta, Result, StorageError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::sync::Arc;

/// Recorded disk call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiskCall {
    List { prefix: String },
    Stat { path: String },
    Exists { path: String },
    Delete { path: String },
    Write { path: String },
}

/// Mock disk holding objects in memory.
///
/// Clones share state, so a test can keep one handle for inspection while the
/// code under test owns another.
#[derive(Clone, Debug, Default)]
pub struct MockDisk {
    objects: Arc<Mutex<BTreeMap<String, ObjectMeta>>>,
    /// Recorded calls
    pub calls: Arc<Mutex<Vec<DiskCall>>>,
    unreachable: Arc<Mutex<bool>>,
    failing_deletes: Arc<Mutex<HashSet<String>>>,
    failing_writes: Arc<Mutex<u32>>,
}

impl MockDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object with explicit metadata
    pub fn with_object(self, path: &str, last_modified: DateTime<Utc>, size: u64) -> Self {
        self.insert(path, last_modified, size);
        self
    }

    /// Make every call fail as if the backend could not be reached
    pub fn with_unreachable(self) -> Self {
        self.set_unreachable(true);
        self
    }

    /// Make deletion of `path` fail
    pub fn with_failing_delete(self, path: &str) -> Self {
        self.failing_deletes.lock().insert(path.to_string());
        self
    }

    /// Make the next `count` writes fail
    pub fn with_failing_writes(self, count: u32) -> Self {
        *self.failing_writes.lock() = count;
        self
    }

    pub fn insert(&self, path: &str, last_modified: DateTime<Utc>, size: u64) {
        self.objects.lock().insert(
            path.to_string(),
            ObjectMeta {
                last_modified,
                size,
            },
        );
    }

    /// Remove an object behind the inventory's back
    pub fn remove(&self, path: &str) {
        self.objects.lock().remove(path);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock() = unreachable;
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn get_calls(&self) -> Vec<DiskCall> {
        self.calls.lock().clone()
    }

    pub fn delete_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DiskCall::Delete { .. }))
            .count()
    }

    pub fn write_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DiskCall::Write { .. }))
            .count()
    }

    fn record_call(&self, call: DiskCall) {
        self.calls.lock().push(call);
    }

    fn check_reachable(&self) -> Result<()> {
        if *self.unreachable.lock() {
            return Err(StorageError::Unavailable("mock disk unreachable".to_string()));
        }
        Ok(())
    }
}

impl Disk for MockDisk {
    fn kind(&self) -> &'static str {
        "mock"
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.record_call(DiskCall::List {
            prefix: prefix.to_string(),
        });
        self.check_reachable()?;

        let dir = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|path| prefix.is_empty() || path.starts_with(&dir))
            .cloned()
            .collect())
    }

    fn stat(&self, path: &str) -> Result<ObjectMeta> {
        self.record_call(DiskCall::Stat {
            path: path.to_string(),
        });
        self.check_reachable()?;

        self.objects
            .lock()
            .get(path)
            .copied()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.record_call(DiskCall::Exists {
            path: path.to_string(),
        });
        self.check_reachable()?;

        Ok(self.objects.lock().contains_key(path))
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.record_call(DiskCall::Delete {
            path: path.to_string(),
        });
        self.check_reachable()?;

        if self.failing_deletes.lock().contains(path) {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                reason: "mock delete failure".to_string(),
            });
        }

        self.objects.lock().remove(path);
        Ok(())
    }

    fn write_stream(&self, path: &str, source: &mut dyn Read) -> Result<u64> {
        self.record_call(DiskCall::Write {
            path: path.to_string(),
        });
        self.check_reachable()?;

        {
            let mut failing = self.failing_writes.lock();
            if *failing > 0 {
                *failing -= 1;
                return Err(StorageError::Rejected {
                    path: path.to_string(),
                    reason: "mock write failure".to_string(),
                });
            }
        }

        let mut buffer = Vec::new();
        source
            .read_to_end(&mut buffer)
            .map_err(|e| StorageError::io(path, e))?;
        let size = buffer.len() as u64;

        self.insert(path, Utc::now(), size);
        Ok(size)
    }
}
