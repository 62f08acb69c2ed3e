//! Backup manager - copies a finished archive to every destination

use crate::destination::{Destination, DestinationError};
use crate::managers::notification::{BackupEvent, NotificationManager};
use crate::utils::format::human_readable_size;
use crate::utils::retry::RetryPolicy;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenCopy {
    pub disk_name: String,
    pub path: String,
    pub bytes: u64,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCopy {
    pub disk_name: String,
    pub error: String,
    pub attempts: u32,
}

/// Outcome of copying one archive, per destination in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub backup_name: String,
    pub written: Vec<WrittenCopy>,
    pub failed: Vec<FailedCopy>,
}

impl BackupReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.written.is_empty()
    }
}

pub struct BackupManager {
    backup_name: String,
    destinations: Vec<Arc<Destination>>,
    retry: RetryPolicy,
    notification_manager: NotificationManager,
    cancel: CancellationToken,
}

impl BackupManager {
    pub fn new(
        backup_name: &str,
        destinations: Vec<Arc<Destination>>,
        retry: RetryPolicy,
        notification_manager: NotificationManager,
    ) -> Self {
        Self {
            backup_name: backup_name.to_string(),
            destinations,
            retry,
            notification_manager,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop retrying once `cancel` fires
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Copy `archive` to every destination.
    ///
    /// Each write is retried on its own; one destination failing does not stop
    /// the others.
    pub async fn copy_archive(&self, archive: &Path) -> BackupReport {
        let start_time = Instant::now();
        info!(
            "Copying {:?} to {} destination(s) of {}",
            archive,
            self.destinations.len(),
            self.backup_name
        );

        let mut tasks = JoinSet::new();
        for (index, destination) in self.destinations.iter().cloned().enumerate() {
            let archive: PathBuf = archive.to_path_buf();
            let retry = self.retry;
            let cancel = self.cancel.clone();

            tasks.spawn_blocking(move || {
                let outcome = retry.run_when(
                    |_| destination.write(&archive),
                    |e| {
                        !cancel.is_cancelled()
                            && !matches!(e, DestinationError::NotAnArchive { .. })
                    },
                );
                let object_path = archive
                    .file_name()
                    .map(|name| destination.object_path(&name.to_string_lossy()))
                    .unwrap_or_default();
                (index, object_path, outcome)
            });
        }

        let mut results: Vec<Option<_>> = (0..self.destinations.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, path, outcome)) => results[index] = Some((path, outcome)),
                Err(e) => error!("Copy task failed: {}", e),
            }
        }

        let mut report = BackupReport {
            backup_name: self.backup_name.clone(),
            ..BackupReport::default()
        };
        for (result, destination) in results.into_iter().zip(&self.destinations) {
            let disk_name = destination.disk_name().to_string();
            let Some((path, outcome)) = result else {
                report.failed.push(FailedCopy {
                    disk_name,
                    error: "copy task did not complete".to_string(),
                    attempts: 0,
                });
                continue;
            };

            let attempts = outcome.attempts;
            match outcome.result {
                Ok(bytes) => {
                    info!(
                        "Copied {} to {} ({})",
                        path,
                        disk_name,
                        human_readable_size(bytes)
                    );
                    self.notification_manager.notify(BackupEvent::BackupWasSuccessful {
                        backup_name: self.backup_name.clone(),
                        disk_name: disk_name.clone(),
                        path: path.clone(),
                        bytes,
                    });
                    report.written.push(WrittenCopy {
                        disk_name,
                        path,
                        bytes,
                        attempts,
                    });
                }
                Err(e) => {
                    error!("Copy to {} failed after {} attempt(s): {}", disk_name, attempts, e);
                    self.notification_manager.notify(BackupEvent::BackupHasFailed {
                        backup_name: self.backup_name.clone(),
                        disk_name: Some(disk_name.clone()),
                        error: e.to_string(),
                    });
                    report.failed.push(FailedCopy {
                        disk_name,
                        error: e.to_string(),
                        attempts,
                    });
                }
            }
        }

        info!(
            "Backup copy of {} finished in {:.1}s: {} written, {} failed",
            self.backup_name,
            start_time.elapsed().as_secs_f64(),
            report.written.len(),
            report.failed.len()
        );
        report
    }
}
