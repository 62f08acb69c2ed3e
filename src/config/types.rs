use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    pub disks: HashMap<String, DiskConfig>,
    pub backup: BackupConfig,
    #[serde(default)]
    pub cleanup: RetentionConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub monitor: Vec<MonitorConfig>,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,

    /// Where run locks are created
    #[serde(default = "default_lock_directory")]
    pub lock_directory: PathBuf,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
            lock_directory: default_lock_directory(),
        }
    }
}

/// Storage disk configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiskConfig {
    #[serde(rename = "type")]
    pub disk_type: DiskType,
    /// Root directory of the disk
    pub root: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    Local,
}

/// The backup being written and cleaned
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    /// Logical backup name, used as object prefix after sanitizing
    pub name: String,
    /// Disks the backup is copied to
    pub disks: Vec<String>,
}

/// Tiered retention settings
///
/// Backups younger than `keep_all_backups_for_days` are all kept. After that
/// one backup per day, week, month and year is kept for the configured number
/// of periods. Anything older is deleted. Finally the oldest backups are
/// deleted until the storage limit is respected.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetentionConfig {
    #[serde(default = "default_keep_all_days")]
    pub keep_all_backups_for_days: u32,
    #[serde(default = "default_keep_daily_days")]
    pub keep_daily_backups_for_days: u32,
    #[serde(default = "default_keep_weekly_weeks")]
    pub keep_weekly_backups_for_weeks: u32,
    #[serde(default = "default_keep_monthly_months")]
    pub keep_monthly_backups_for_months: u32,
    #[serde(default = "default_keep_yearly_years")]
    pub keep_yearly_backups_for_years: u32,
    /// 0 disables the storage limit
    #[serde(default = "default_storage_limit_mb")]
    pub delete_oldest_backups_when_using_more_megabytes_than: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_all_backups_for_days: default_keep_all_days(),
            keep_daily_backups_for_days: default_keep_daily_days(),
            keep_weekly_backups_for_weeks: default_keep_weekly_weeks(),
            keep_monthly_backups_for_months: default_keep_monthly_months(),
            keep_yearly_backups_for_years: default_keep_yearly_years(),
            delete_oldest_backups_when_using_more_megabytes_than: default_storage_limit_mb(),
        }
    }
}

/// Retry settings per operation kind
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub backup: RetrySettings,
    #[serde(default = "default_cleanup_retry")]
    pub cleanup: RetrySettings,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backup: RetrySettings::default(),
            cleanup: default_cleanup_retry(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetrySettings {
    #[serde(default = "default_tries")]
    pub tries: u32,
    #[serde(default)]
    pub delay_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            tries: default_tries(),
            delay_seconds: 0,
        }
    }
}

/// Health thresholds for one monitored backup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub name: String,
    pub disks: Vec<String>,
    #[serde(default = "default_max_age_days")]
    pub newest_backup_should_not_be_older_than_days: u32,
    /// 0 disables the check
    #[serde(default = "default_storage_limit_mb")]
    pub storage_used_may_not_be_higher_than_megabytes: u64,
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notify_on")]
    pub notify_on: Vec<NotifyEvent>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            notify_on: default_notify_on(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotifyEvent {
    Failure,
    Success,
    Unhealthy,
    Healthy,
}

// Default value functions

fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_lock_directory() -> PathBuf { std::env::temp_dir() }
fn default_keep_all_days() -> u32 { 7 }
fn default_keep_daily_days() -> u32 { 16 }
fn default_keep_weekly_weeks() -> u32 { 8 }
fn default_keep_monthly_months() -> u32 { 4 }
fn default_keep_yearly_years() -> u32 { 2 }
fn default_storage_limit_mb() -> u64 { 5000 }
fn default_tries() -> u32 { 1 }
fn default_cleanup_retry() -> RetrySettings {
    RetrySettings { tries: 3, delay_seconds: 5 }
}
fn default_max_age_days() -> u32 { 1 }
fn default_notify_on() -> Vec<NotifyEvent> {
    vec![NotifyEvent::Failure, NotifyEvent::Unhealthy]
}
