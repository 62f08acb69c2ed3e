//! Test context and harness for integration testing
//!
//! Owns the temp directory, the configuration and a disk registry built from
//! it, so flows can be driven exactly as the binary drives them.

use crate::config_builder::ConfigBuilder;
use crate::fixtures::{config_toml, write_aged_archive};
use anyhow::{Context, Result};
use backup_keeper::config::Config;
use backup_keeper::destination::{create_destinations, Destination};
use backup_keeper::storage::DiskRegistry;
use chrono::TimeDelta;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Test context that manages test resources and provides common utilities
pub struct TestContext {
    /// Temporary directory for test files
    temp_dir: TempDir,
    config: Config,
    registry: DiskRegistry,
}

impl TestContext {
    /// Create a test context with a minimal configuration
    pub fn with_minimal_config() -> Self {
        Self::from_builder(ConfigBuilder::minimal())
    }

    /// Create a test context from a ConfigBuilder
    pub fn from_builder(builder: ConfigBuilder) -> Self {
        let (config, temp_dir) = builder.persist();
        let registry = DiskRegistry::from_config(&config.disks);

        Self {
            temp_dir,
            config,
            registry,
        }
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &DiskRegistry {
        &self.registry
    }

    /// Root directory of a configured disk
    pub fn disk_root(&self, disk_name: &str) -> PathBuf {
        self.config
            .disks
            .get(disk_name)
            .map(|d| d.root.clone())
            .unwrap_or_else(|| panic!("No disk named '{}' in test config", disk_name))
    }

    /// Destinations of the configured backup, in configuration order
    pub fn destinations(&self) -> Result<Vec<Arc<Destination>>> {
        Ok(create_destinations(
            &self.registry,
            &self.config.backup.name,
            &self.config.backup.disks,
        )?)
    }

    /// Write an archive on a disk, backdated by `age`
    pub fn write_archive(
        &self,
        disk_name: &str,
        relative_path: &str,
        age: TimeDelta,
        size: usize,
    ) -> PathBuf {
        write_aged_archive(&self.disk_root(disk_name), relative_path, age, size)
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Serialize the configuration to `backup-keeper.toml` in the temp dir
    pub fn write_config(&self) -> Result<PathBuf> {
        let content = toml::to_string_pretty(&self.config).context("Failed to serialize config")?;
        Ok(self.create_file("backup-keeper.toml", &content))
    }

    /// Write the full config template pointing at the `local` disk
    pub fn write_template_config(&self) -> PathBuf {
        let content = config_toml(
            &self.disk_root("local"),
            &self.config.global.log_directory,
            &self.config.global.lock_directory,
        );
        self.create_file("backup-keeper.toml", &content)
    }

    /// Relative paths of all files on a disk, sorted
    pub fn files_on(&self, disk_name: &str) -> Vec<String> {
        let root = self.disk_root(disk_name);
        let mut files = Vec::new();
        collect_files(&root, &root, &mut files);
        files.sort();
        files
    }
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files);
        } else if let Ok(relative) = path.strip_prefix(root) {
            files.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}
