use super::record::{is_archive, BackupRecord};
use crate::storage::{Disk, ObjectEntry, StorageError};
use std::sync::Arc;

/// Backups found on one destination, newest first
#[derive(Debug, Clone, Default)]
pub struct BackupInventory {
    records: Vec<BackupRecord>,
}

impl BackupInventory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a plain path listing, fetching metadata per archive
    pub fn from_listing<I>(disk: Arc<dyn Disk>, paths: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut records = Vec::new();
        for path in paths.into_iter().filter(|p| is_archive(p)) {
            let meta = disk.stat(&path)?;
            records.push(BackupRecord::new(path, Arc::clone(&disk), meta));
        }
        Ok(Self::sorted(records))
    }

    /// Build from a listing that already carries metadata
    pub fn from_entries<I>(disk: Arc<dyn Disk>, entries: I) -> Self
    where
        I: IntoIterator<Item = ObjectEntry>,
    {
        let records = entries
            .into_iter()
            .filter(|entry| is_archive(&entry.path))
            .map(|entry| BackupRecord::new(entry.path, Arc::clone(&disk), entry.meta))
            .collect();
        Self::sorted(records)
    }

    fn sorted(mut records: Vec<BackupRecord>) -> Self {
        // Stable, so equal timestamps keep listing order
        records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        Self { records }
    }

    pub fn newest(&self) -> Option<&BackupRecord> {
        self.records.first()
    }

    /// Oldest record still present on the backend
    pub fn oldest(&self) -> Result<Option<&BackupRecord>, StorageError> {
        for record in self.records.iter().rev() {
            if record.exists()? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Sum of current record sizes
    pub fn size(&self) -> Result<u64, StorageError> {
        self.records
            .iter()
            .try_fold(0u64, |total, record| Ok(total + record.size()?))
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BackupRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[BackupRecord] {
        &self.records
    }
}

impl IntoIterator for BackupInventory {
    type Item = BackupRecord;
    type IntoIter = std::vec::IntoIter<BackupRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a BackupInventory {
    type Item = &'a BackupRecord;
    type IntoIter = std::slice::Iter<'a, BackupRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
