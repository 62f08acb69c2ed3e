//! Backup Keeper Library
//!
//! Inventory, retention, cleanup and health checks for backup archives kept on
//! one or more storage disks.

pub mod config;
pub mod destination;
pub mod managers;
pub mod retention;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, resolve_monitors, Config, ResolvedMonitor};
pub use destination::{BackupInventory, BackupRecord, Destination, DestinationError};
pub use managers::backup::{BackupManager, BackupReport};
pub use managers::cleanup::{AggregateRunError, CleanupError, CleanupExecutor, CleanupReport};
pub use managers::health::{HealthEvaluator, HealthStatus, HealthThresholds};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::{BackupEvent, EventSink, NotificationManager};
pub use retention::{PolicyError, RetentionDecision, RetentionPolicy, TieredRetention};
pub use storage::{Disk, DiskRegistry, LocalDisk, StorageError};
pub use utils::retry::RetryPolicy;
