//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.

use backup_keeper::config::{
    BackupConfig, Config, DiskConfig, DiskType, GlobalConfig, MonitorConfig,
    NotificationConfig, RetentionConfig, RetryConfig, RetrySettings,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    disks: HashMap<String, DiskConfig>,
    backup: BackupConfig,
    cleanup: RetentionConfig,
    retry: RetryConfig,
    monitors: Vec<MonitorConfig>,
    notifications: NotificationConfig,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with no disks
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let lock_directory = temp_dir.path().join("locks");
        fs::create_dir_all(&lock_directory).expect("Failed to create lock_directory");

        let global = GlobalConfig {
            log_directory,
            log_level: "debug".to_string(),
            log_max_files: 5,
            lock_directory,
        };

        Self {
            temp_dir,
            global,
            disks: HashMap::new(),
            backup: BackupConfig {
                name: "my-site.com".to_string(),
                disks: vec![],
            },
            cleanup: RetentionConfig::default(),
            // No delays in tests
            retry: RetryConfig {
                backup: RetrySettings { tries: 1, delay_seconds: 0 },
                cleanup: RetrySettings { tries: 1, delay_seconds: 0 },
            },
            monitors: Vec::new(),
            notifications: NotificationConfig::default(),
        }
    }

    /// Create a minimal config: one local disk `local` backing `my-site.com`
    pub fn minimal() -> Self {
        let builder = Self::new();
        let root = builder.temp_dir.path().join("backups");
        fs::create_dir_all(&root).expect("Failed to create backup dir");

        builder.add_local_disk("local", &root).with_backup_disks(&["local"])
    }

    /// Add a local disk rooted at `root`
    pub fn add_local_disk(mut self, name: &str, root: &Path) -> Self {
        self.disks.insert(
            name.to_string(),
            DiskConfig {
                disk_type: DiskType::Local,
                root: root.to_path_buf(),
            },
        );
        self
    }

    /// Add a local disk whose root does not exist
    pub fn add_missing_disk(self, name: &str) -> Self {
        let root = self.temp_dir.path().join(format!("missing-{}", name));
        self.add_local_disk(name, &root)
    }

    /// Add a local disk in a fresh subdirectory of the temp dir
    pub fn add_temp_disk(self, name: &str) -> Self {
        let root = self.temp_dir.path().join(format!("disk-{}", name));
        fs::create_dir_all(&root).expect("Failed to create disk dir");
        self.add_local_disk(name, &root)
    }

    pub fn with_backup_name(mut self, name: &str) -> Self {
        self.backup.name = name.to_string();
        self
    }

    pub fn with_backup_disks(mut self, disks: &[&str]) -> Self {
        self.backup.disks = disks.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Set the retention policy
    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.cleanup = retention;
        self
    }

    /// Keep everything younger than `days`, nothing else
    pub fn with_keep_all_days(self, days: u32) -> Self {
        self.with_retention(RetentionConfig {
            keep_all_backups_for_days: days,
            keep_daily_backups_for_days: 0,
            keep_weekly_backups_for_weeks: 0,
            keep_monthly_backups_for_months: 0,
            keep_yearly_backups_for_years: 0,
            delete_oldest_backups_when_using_more_megabytes_than: 0,
        })
    }

    pub fn with_cleanup_tries(mut self, tries: u32) -> Self {
        self.retry.cleanup.tries = tries;
        self
    }

    pub fn with_backup_tries(mut self, tries: u32) -> Self {
        self.retry.backup.tries = tries;
        self
    }

    pub fn add_monitor(
        mut self,
        name: &str,
        disks: &[&str],
        max_age_days: u32,
        max_storage_mb: u64,
    ) -> Self {
        self.monitors.push(MonitorConfig {
            name: name.to_string(),
            disks: disks.iter().map(|d| d.to_string()).collect(),
            newest_backup_should_not_be_older_than_days: max_age_days,
            storage_used_may_not_be_higher_than_megabytes: max_storage_mb,
        });
        self
    }

    /// Set notification configuration
    pub fn with_notifications(mut self, config: NotificationConfig) -> Self {
        self.notifications = config;
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Root directory of a configured disk
    pub fn disk_root(&self, name: &str) -> Option<PathBuf> {
        self.disks.get(name).map(|d| d.root.clone())
    }

    /// Build the Config
    pub fn build(self) -> Config {
        self.persist().0
    }

    /// Keep the temp directory (don't delete on drop)
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            global: self.global,
            disks: self.disks,
            backup: self.backup,
            cleanup: self.cleanup,
            retry: self.retry,
            monitor: self.monitors,
            notifications: self.notifications,
        };
        (config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
