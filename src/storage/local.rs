//! Local filesystem disk

use super::{Disk, ObjectEntry, ObjectMeta, Result, StorageError};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Disk backed by a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a backend-relative path onto the root, refusing anything that
    /// would escape it
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if escapes {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                reason: "path must be relative to the disk root".to_string(),
            });
        }

        Ok(self.root.join(relative))
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Unavailable(format!(
                "disk root {} is not a directory",
                self.root.display()
            )))
        }
    }

    fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn walk(&self, dir: &Path, out: &mut Vec<ObjectEntry>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::io(self.relative_path(dir), e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(self.relative_path(dir), e))?;
            let path = entry.path();
            let metadata = entry
                .metadata()
                .map_err(|e| StorageError::io(self.relative_path(&path), e))?;

            if metadata.is_dir() {
                self.walk(&path, out)?;
            } else if metadata.is_file() {
                out.push(ObjectEntry {
                    path: self.relative_path(&path),
                    meta: meta_from(&metadata, &self.relative_path(&path))?,
                });
            }
        }

        Ok(())
    }
}

fn meta_from(metadata: &fs::Metadata, path: &str) -> Result<ObjectMeta> {
    let modified = metadata
        .modified()
        .map_err(|e| StorageError::io(path, e))?;

    Ok(ObjectMeta {
        last_modified: DateTime::<Utc>::from(modified),
        size: metadata.len(),
    })
}

impl Disk for LocalDisk {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .list_with_metadata(prefix)?
            .into_iter()
            .map(|entry| entry.path)
            .collect())
    }

    fn stat(&self, path: &str) -> Result<ObjectMeta> {
        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full).map_err(|e| StorageError::io(path, e))?;
        meta_from(&metadata, path)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        match fs::metadata(&full) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Delete of missing object ignored: {}", path);
                Ok(())
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn write_stream(&self, path: &str, source: &mut dyn Read) -> Result<u64> {
        self.ensure_root()?;
        let full = self.resolve(path)?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(path, e))?;
        }

        let file = File::create(&full).map_err(|e| StorageError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let written = io::copy(source, &mut writer).map_err(|e| StorageError::io(path, e))?;
        writer.flush().map_err(|e| StorageError::io(path, e))?;

        Ok(written)
    }

    /// A single directory walk yields both paths and metadata
    fn list_with_metadata(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        self.ensure_root()?;
        let dir = self.resolve(prefix)?;

        let mut entries = Vec::new();
        self.walk(&dir, &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(entries)
    }
}
