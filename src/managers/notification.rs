//! Notification events
//!
//! Runs produce plain values (reports, health statuses). The notification
//! manager turns their outcome into [`BackupEvent`]s, filters them by the
//! configured categories and hands them to an [`EventSink`].

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{NotificationConfig, NotifyEvent};
use crate::managers::health::HealthStatus;

/// Something worth telling an operator about
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum BackupEvent {
    BackupWasSuccessful {
        backup_name: String,
        disk_name: String,
        path: String,
        bytes: u64,
    },
    BackupHasFailed {
        backup_name: String,
        disk_name: Option<String>,
        error: String,
    },
    CleanupWasSuccessful {
        backup_name: String,
        kept: usize,
        deleted: usize,
        failed: usize,
        skipped: usize,
    },
    CleanupHasFailed {
        backup_name: String,
        attempts: u32,
        error: String,
    },
    HealthyBackupWasFound {
        status: HealthStatus,
    },
    UnhealthyBackupWasFound {
        status: HealthStatus,
    },
}

impl BackupEvent {
    /// Category used for `notify_on` filtering
    pub fn category(&self) -> NotifyEvent {
        match self {
            Self::BackupWasSuccessful { .. } | Self::CleanupWasSuccessful { .. } => {
                NotifyEvent::Success
            }
            Self::BackupHasFailed { .. } | Self::CleanupHasFailed { .. } => NotifyEvent::Failure,
            Self::HealthyBackupWasFound { .. } => NotifyEvent::Healthy,
            Self::UnhealthyBackupWasFound { .. } => NotifyEvent::Unhealthy,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BackupWasSuccessful { .. } => "BackupWasSuccessful",
            Self::BackupHasFailed { .. } => "BackupHasFailed",
            Self::CleanupWasSuccessful { .. } => "CleanupWasSuccessful",
            Self::CleanupHasFailed { .. } => "CleanupHasFailed",
            Self::HealthyBackupWasFound { .. } => "HealthyBackupWasFound",
            Self::UnhealthyBackupWasFound { .. } => "UnhealthyBackupWasFound",
        }
    }

    /// One-line human readable summary
    pub fn message(&self) -> String {
        match self {
            Self::BackupWasSuccessful {
                backup_name,
                disk_name,
                path,
                bytes,
            } => format!(
                "Backup of {} copied to {} as {} ({} bytes)",
                backup_name, disk_name, path, bytes
            ),
            Self::BackupHasFailed {
                backup_name,
                disk_name: Some(disk_name),
                error,
            } => format!("Backup of {} to {} failed: {}", backup_name, disk_name, error),
            Self::BackupHasFailed {
                backup_name,
                disk_name: None,
                error,
            } => format!("Backup of {} failed: {}", backup_name, error),
            Self::CleanupWasSuccessful {
                backup_name,
                kept,
                deleted,
                failed,
                skipped,
            } => format!(
                "Cleanup of {} finished: {} kept, {} deleted, {} failed, {} destinations skipped",
                backup_name, kept, deleted, failed, skipped
            ),
            Self::CleanupHasFailed {
                backup_name,
                attempts,
                error,
            } => format!(
                "Cleanup of {} failed after {} attempt(s): {}",
                backup_name, attempts, error
            ),
            Self::HealthyBackupWasFound { status } => format!(
                "Backup {} on {} is healthy",
                status.backup_name, status.disk_name
            ),
            Self::UnhealthyBackupWasFound { status } => format!(
                "Backup {} on {} is unhealthy: {}",
                status.backup_name,
                status.disk_name,
                status.problems().join(", ")
            ),
        }
    }
}

/// Delivery channel for events
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &BackupEvent) -> Result<()>;

    /// Sink name (for logging)
    fn name(&self) -> &'static str;
}

/// Writes events to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver(&self, event: &BackupEvent) -> Result<()> {
        match event.category() {
            NotifyEvent::Failure | NotifyEvent::Unhealthy => {
                error!(event = event.name(), "{}", event.message())
            }
            NotifyEvent::Success | NotifyEvent::Healthy => {
                info!(event = event.name(), "{}", event.message())
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Filters events by category and forwards them to a sink
pub struct NotificationManager {
    config: NotificationConfig,
    sink: Box<dyn EventSink>,
    enabled: bool,
}

impl NotificationManager {
    pub fn new(config: NotificationConfig, sink: Box<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            enabled: true,
        }
    }

    /// Manager delivering to the log
    pub fn with_log_sink(config: NotificationConfig) -> Self {
        Self::new(config, Box::new(LogSink))
    }

    /// Suppress all dispatch (`--disable-notifications`)
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.enabled = !disabled;
        self
    }

    /// Check if notifications are enabled for an event category
    pub fn is_enabled(&self, category: &NotifyEvent) -> bool {
        self.enabled && self.config.notify_on.contains(category)
    }

    /// Deliver if enabled. Returns whether the event was delivered.
    pub fn send(&self, event: &BackupEvent) -> Result<bool> {
        let category = event.category();
        if !self.is_enabled(&category) {
            debug!("Notification {} ({:?}) not enabled, skipping", event.name(), category);
            return Ok(false);
        }

        self.sink.deliver(event)?;
        Ok(true)
    }

    /// Deliver if enabled, logging delivery failures instead of returning them
    pub fn notify(&self, event: BackupEvent) {
        if let Err(e) = self.send(&event) {
            warn!(
                "Failed to deliver {} through {} sink: {}",
                event.name(),
                self.sink.name(),
                e
            );
        }
    }
}

/// Sinks for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Sink recording every delivered event
    #[derive(Clone, Default)]
    pub struct CollectingSink {
        pub events: Arc<Mutex<Vec<BackupEvent>>>,
        fail: bool,
    }

    impl CollectingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sink whose deliveries always fail
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn events(&self) -> Vec<BackupEvent> {
            self.events.lock().clone()
        }

        pub fn names(&self) -> Vec<&'static str> {
            self.events.lock().iter().map(|e| e.name()).collect()
        }
    }

    impl EventSink for CollectingSink {
        fn deliver(&self, event: &BackupEvent) -> Result<()> {
            if self.fail {
                anyhow::bail!("collecting sink configured to fail");
            }
            self.events.lock().push(event.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "collecting"
        }
    }
}
