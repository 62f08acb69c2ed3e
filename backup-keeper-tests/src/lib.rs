//! Test utilities for backup-keeper
//!
//! This crate provides shared test utilities, fixtures, and helper functions
//! for testing the backup-keeper library.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::from_builder(ConfigBuilder::minimal());
//!     ctx.write_archive("local", "my-site.com/2024-01-01.zip", days(3), 100);
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use backup_keeper::config::{
    BackupConfig, Config, DiskConfig, DiskType, GlobalConfig, MonitorConfig,
    NotificationConfig, NotifyEvent, RetentionConfig, RetryConfig, RetrySettings,
};
pub use backup_keeper::destination::{BackupInventory, Destination};
pub use backup_keeper::storage::{Disk, DiskRegistry, LocalDisk};

// Re-export mock implementations from the main crate
pub use backup_keeper::managers::notification::mock::CollectingSink;
pub use backup_keeper::storage::mock::{DiskCall, MockDisk};

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
