//! Test fixtures and sample data
//!
//! Provides pre-built backup sets and config templates for testing.

use backup_keeper::storage::mock::MockDisk;
use chrono::{DateTime, TimeDelta, Utc};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A fixed "now" so tests that build timestamps do not depend on the clock
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-15T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub fn days(n: i64) -> TimeDelta {
    TimeDelta::days(n)
}

pub fn hours(n: i64) -> TimeDelta {
    TimeDelta::hours(n)
}

/// Object path for a backup `age` before `now`, named after its date
pub fn archive_path(backup_name: &str, now: DateTime<Utc>, age: TimeDelta) -> String {
    let timestamp = now - age;
    format!("{}/{}.zip", backup_name, timestamp.format("%Y-%m-%d-%H-%M-%S"))
}

/// Mock disk holding one archive per `(age in days, size in bytes)` entry
pub fn mock_disk_with_ages(
    backup_name: &str,
    now: DateTime<Utc>,
    ages: &[(i64, u64)],
) -> MockDisk {
    ages.iter().fold(MockDisk::new(), |disk, &(age_days, size)| {
        let age = days(age_days);
        disk.with_object(&archive_path(backup_name, now, age), now - age, size)
    })
}

/// Write an archive of `size` bytes under `root` and backdate its mtime by `age`
pub fn write_aged_archive(
    root: &Path,
    relative_path: &str,
    age: TimeDelta,
    size: usize,
) -> PathBuf {
    let path = root.join(relative_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create archive directory");
    }
    fs::write(&path, vec![0u8; size]).expect("Failed to write archive");

    let modified = SystemTime::from(Utc::now() - age);
    File::options()
        .write(true)
        .open(&path)
        .and_then(|file| file.set_modified(modified))
        .expect("Failed to set modification time");
    path
}

/// Create a local archive ready to be copied by the backup command
pub fn sample_archive(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"PK\x03\x04 sample archive contents").expect("Failed to write archive");
    path
}

/// Full configuration template.
///
/// `{root}`, `{logs}` and `{locks}` are substituted by [`config_toml`].
pub const CONFIG_TEMPLATE: &str = r#"
[global]
log_directory = "{logs}"
log_level = "debug"
log_max_files = 3
lock_directory = "{locks}"

[disks.local]
type = "local"
root = "{root}"

[backup]
name = "my-site.com"
disks = ["local"]

[cleanup]
keep_all_backups_for_days = 7
keep_daily_backups_for_days = 16
keep_weekly_backups_for_weeks = 8
keep_monthly_backups_for_months = 4
keep_yearly_backups_for_years = 2
delete_oldest_backups_when_using_more_megabytes_than = 5000

[retry.cleanup]
tries = 1
delay_seconds = 0

[[monitor]]
name = "my-site.com"
disks = ["local"]
newest_backup_should_not_be_older_than_days = 1
storage_used_may_not_be_higher_than_megabytes = 5000

[notifications]
notify_on = ["failure", "unhealthy"]
"#;

/// Render [`CONFIG_TEMPLATE`] for a working directory layout
pub fn config_toml(root: &Path, logs: &Path, locks: &Path) -> String {
    CONFIG_TEMPLATE
        .replace("{root}", &toml_path(root))
        .replace("{logs}", &toml_path(logs))
        .replace("{locks}", &toml_path(locks))
}

// Backslashes must not be read as escapes on Windows
fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}
