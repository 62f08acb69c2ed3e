use super::types::*;
use crate::destination::is_unusable_backup_name;
use crate::retention::TieredRetention;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Disk '{0}' not found")]
    DiskNotFound(String),

    #[error("Invalid cleanup configuration: {0}")]
    Retention(#[from] crate::retention::PolicyError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.disks.is_empty() {
        return Err(ConfigError::ValidationError("No disks defined".to_string()));
    }

    if config.backup.name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "backup.name must not be empty".to_string(),
        ));
    }
    check_backup_name("backup.name", &config.backup.name)?;

    if config.backup.disks.is_empty() {
        return Err(ConfigError::ValidationError(
            "backup.disks must name at least one disk".to_string(),
        ));
    }
    check_disks_exist(&config.backup.disks, config)?;

    for monitor in &config.monitor {
        if monitor.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "monitor.name must not be empty".to_string(),
            ));
        }
        check_backup_name("monitor.name", &monitor.name)?;
        check_disks_exist(&monitor.disks, config)?;
    }

    // Same check the cleanup run performs before touching anything
    TieredRetention::new(&config.cleanup)?;

    Ok(())
}

fn check_backup_name(field: &str, name: &str) -> Result<()> {
    if is_unusable_backup_name(name) {
        return Err(ConfigError::ValidationError(format!(
            "{} '{}' does not name a backup directory",
            field, name
        )));
    }
    Ok(())
}

fn check_disks_exist(disks: &[String], config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for disk in disks {
        if !config.disks.contains_key(disk) {
            return Err(ConfigError::DiskNotFound(disk.clone()));
        }
        if !seen.insert(disk) {
            return Err(ConfigError::ValidationError(format!(
                "Disk '{}' listed twice",
                disk
            )));
        }
    }
    Ok(())
}

/// Monitored backup after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMonitor {
    pub name: String,
    pub disks: Vec<String>,
    pub max_age_days: u32,
    /// 0 disables the check
    pub max_storage_bytes: u64,
}

/// Resolve the monitors to evaluate.
///
/// Without an explicit `[[monitor]]` list the `[backup]` section is monitored
/// with default thresholds.
pub fn resolve_monitors(config: &Config) -> Vec<ResolvedMonitor> {
    if config.monitor.is_empty() {
        let defaults: MonitorConfig = MonitorConfig {
            name: config.backup.name.clone(),
            disks: config.backup.disks.clone(),
            newest_backup_should_not_be_older_than_days: 1,
            storage_used_may_not_be_higher_than_megabytes: 5000,
        };
        return vec![resolve_monitor(&defaults)];
    }

    config.monitor.iter().map(resolve_monitor).collect()
}

fn resolve_monitor(monitor: &MonitorConfig) -> ResolvedMonitor {
    ResolvedMonitor {
        name: monitor.name.clone(),
        disks: monitor.disks.clone(),
        max_age_days: monitor.newest_backup_should_not_be_older_than_days,
        max_storage_bytes: megabytes_to_bytes(
            monitor.storage_used_may_not_be_higher_than_megabytes,
        ),
    }
}

pub fn megabytes_to_bytes(megabytes: u64) -> u64 {
    megabytes.saturating_mul(1024 * 1024)
}
