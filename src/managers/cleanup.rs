//! Cleanup manager
//!
//! Applies a retention policy to every destination of a backup and deletes
//! what the policy rejects. Destinations are cleaned concurrently; within one
//! destination the order is list, decide, delete.
//!
//! Failures stay as local as possible:
//! - an unreachable destination is skipped, nothing is deleted there
//! - a failed deletion is recorded and the remaining records are still processed
//! - only an invalid policy (or failing to prepare the run) fails the whole run

use crate::config::Config;
use crate::destination::{create_destinations, Destination};
use crate::managers::notification::{BackupEvent, NotificationManager};
use crate::retention::{PolicyError, RetentionPolicy, TieredRetention};
use crate::storage::DiskRegistry;
use crate::utils::format::human_readable_size;
use crate::utils::retry::RetryPolicy;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("cleanup was cancelled")]
    Cancelled,

    #[error("failed to prepare cleanup: {0}")]
    Setup(String),
}

impl CleanupError {
    /// Configuration problems and cancellation do not go away by retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Setup(_))
    }
}

/// A cleanup run that failed after all configured attempts
#[derive(Debug, thiserror::Error)]
#[error("cleanup of '{backup_name}' failed after {attempts} attempt(s): {source}")]
pub struct AggregateRunError {
    pub backup_name: String,
    pub attempts: u32,
    #[source]
    pub source: CleanupError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDeletion {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Cleaned {
        kept: usize,
        deleted: usize,
        failed: Vec<FailedDeletion>,
    },
    Skipped {
        reason: String,
    },
    Cancelled,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationCleanup {
    pub backup_name: String,
    pub disk_name: String,
    #[serde(flatten)]
    pub outcome: CleanupOutcome,
}

/// Per-destination results of one cleanup run, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub destinations: Vec<DestinationCleanup>,
    pub cancelled: bool,
}

impl CleanupReport {
    fn cleaned(&self) -> impl Iterator<Item = (usize, usize, &[FailedDeletion])> + '_ {
        self.destinations.iter().filter_map(|d| match &d.outcome {
            CleanupOutcome::Cleaned {
                kept,
                deleted,
                failed,
            } => Some((*kept, *deleted, failed.as_slice())),
            _ => None,
        })
    }

    /// Destinations where the policy was applied
    pub fn processed(&self) -> usize {
        self.cleaned().count()
    }

    /// Destinations left alone: unreachable or cancelled
    pub fn skipped(&self) -> usize {
        self.destinations
            .iter()
            .filter(|d| {
                matches!(
                    d.outcome,
                    CleanupOutcome::Skipped { .. } | CleanupOutcome::Cancelled
                )
            })
            .count()
    }

    /// Destinations whose cleanup failed as a whole
    pub fn errored(&self) -> usize {
        self.errors().count()
    }

    fn errors(&self) -> impl Iterator<Item = &DestinationCleanup> + '_ {
        self.destinations
            .iter()
            .filter(|d| matches!(d.outcome, CleanupOutcome::Failed { .. }))
    }

    pub fn kept(&self) -> usize {
        self.cleaned().map(|(kept, _, _)| kept).sum()
    }

    pub fn deleted(&self) -> usize {
        self.cleaned().map(|(_, deleted, _)| deleted).sum()
    }

    pub fn failed(&self) -> usize {
        self.cleaned().map(|(_, _, failed)| failed.len()).sum()
    }
}

/// Destinations and policy of one cleanup attempt
pub struct CleanupPlan {
    pub destinations: Vec<Arc<Destination>>,
    pub policy: Arc<dyn RetentionPolicy>,
}

impl CleanupPlan {
    /// Destinations of `[backup]` with the configured tiered policy
    pub fn from_config(config: &Config, registry: &DiskRegistry) -> Result<Self, CleanupError> {
        let destinations = create_destinations(registry, &config.backup.name, &config.backup.disks)
            .map_err(|e| CleanupError::Setup(e.to_string()))?;
        let policy: Arc<dyn RetentionPolicy> = Arc::new(TieredRetention::new(&config.cleanup)?);

        Ok(Self {
            destinations,
            policy,
        })
    }
}

/// Runs retention over destinations
#[derive(Debug, Clone, Default)]
pub struct CleanupExecutor {
    cancel: CancellationToken,
}

impl CleanupExecutor {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Clean one destination (blocking)
    pub fn clean_destination(
        &self,
        destination: &Destination,
        policy: &dyn RetentionPolicy,
    ) -> DestinationCleanup {
        let outcome = self.clean_outcome(destination, policy);
        DestinationCleanup {
            backup_name: destination.backup_name().to_string(),
            disk_name: destination.disk_name().to_string(),
            outcome,
        }
    }

    fn clean_outcome(
        &self,
        destination: &Destination,
        policy: &dyn RetentionPolicy,
    ) -> CleanupOutcome {
        if self.cancel.is_cancelled() {
            return CleanupOutcome::Cancelled;
        }

        let inventory = match destination.try_get_backups() {
            Ok(inventory) => inventory,
            Err(e) => {
                warn!(
                    "Skipping cleanup of {} on {}: {}",
                    destination.backup_name(),
                    destination.disk_name(),
                    e
                );
                return CleanupOutcome::Skipped {
                    reason: destination
                        .connection_error()
                        .unwrap_or_else(|| e.to_string()),
                };
            }
        };

        let decision = match policy.apply(&inventory) {
            Ok(decision) => decision,
            Err(e) => {
                error!(
                    "Retention policy '{}' failed on {}: {}",
                    policy.name(),
                    destination.disk_name(),
                    e
                );
                return CleanupOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        if self.cancel.is_cancelled() {
            info!("Cleanup of {} cancelled before deleting", destination.disk_name());
            return CleanupOutcome::Cancelled;
        }

        info!(
            "Cleaning {} on {}: keeping {}, deleting {}",
            destination.backup_name(),
            destination.disk_name(),
            decision.keep.len(),
            decision.delete.len()
        );

        let mut deleted = 0;
        let mut failed = Vec::new();
        for record in &decision.delete {
            match destination.delete(record) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    error!("{}", e);
                    failed.push(FailedDeletion {
                        path: record.path().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Used storage of {} on {} after cleanup: {}",
            destination.backup_name(),
            destination.disk_name(),
            human_readable_size(destination.used_storage())
        );

        CleanupOutcome::Cleaned {
            kept: decision.keep.len(),
            deleted,
            failed,
        }
    }

    /// Clean all destinations concurrently.
    ///
    /// The policy is validated first; an invalid policy deletes nothing.
    pub async fn run(
        &self,
        destinations: Vec<Arc<Destination>>,
        policy: Arc<dyn RetentionPolicy>,
    ) -> Result<CleanupReport, CleanupError> {
        policy.validate()?;

        let mut tasks = JoinSet::new();
        for (index, destination) in destinations.iter().cloned().enumerate() {
            let executor = self.clone();
            let policy = Arc::clone(&policy);
            tasks.spawn_blocking(move || {
                (index, executor.clean_destination(&destination, policy.as_ref()))
            });
        }

        let mut results: Vec<Option<DestinationCleanup>> = vec![None; destinations.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, cleanup)) => results[index] = Some(cleanup),
                Err(e) => error!("Cleanup task failed: {}", e),
            }
        }

        let destinations = results
            .into_iter()
            .zip(&destinations)
            .map(|(cleanup, destination)| {
                cleanup.unwrap_or_else(|| DestinationCleanup {
                    backup_name: destination.backup_name().to_string(),
                    disk_name: destination.disk_name().to_string(),
                    outcome: CleanupOutcome::Failed {
                        error: "cleanup task did not complete".to_string(),
                    },
                })
            })
            .collect();

        Ok(CleanupReport {
            destinations,
            cancelled: self.cancel.is_cancelled(),
        })
    }

    /// Prepare and run cleanup with retries, then dispatch the outcome.
    ///
    /// `prepare` is called once per attempt.
    pub async fn run_with_retry<F>(
        &self,
        backup_name: &str,
        retry: &RetryPolicy,
        notifier: &NotificationManager,
        mut prepare: F,
    ) -> Result<CleanupReport, AggregateRunError>
    where
        F: FnMut() -> Result<CleanupPlan, CleanupError>,
    {
        info!("Starting cleanup of {}", backup_name);

        let this = self;
        let outcome = retry
            .run_async_when(
                move |attempt| {
                    let plan = prepare();
                    async move {
                        if attempt > 1 {
                            info!("Cleanup attempt {}/{}", attempt, retry.max_attempts());
                        }
                        let plan = plan?;
                        this.run(plan.destinations, plan.policy).await
                    }
                },
                |e| e.is_retryable() && !this.cancel.is_cancelled(),
            )
            .await;

        match outcome.result {
            Ok(report) => {
                if report.cancelled {
                    warn!("Cleanup of {} was cancelled", backup_name);
                } else if report.errored() > 0 {
                    let errors: Vec<String> = report
                        .errors()
                        .filter_map(|d| match &d.outcome {
                            CleanupOutcome::Failed { error } => {
                                Some(format!("{}: {}", d.disk_name, error))
                            }
                            _ => None,
                        })
                        .collect();
                    error!(
                        "Cleanup of {} failed on {} destination(s)",
                        backup_name,
                        errors.len()
                    );
                    notifier.notify(BackupEvent::CleanupHasFailed {
                        backup_name: backup_name.to_string(),
                        attempts: outcome.attempts,
                        error: errors.join("; "),
                    });
                } else {
                    info!(
                        "Cleanup of {} completed: {} deleted, {} failed, {} skipped",
                        backup_name,
                        report.deleted(),
                        report.failed(),
                        report.skipped()
                    );
                    notifier.notify(BackupEvent::CleanupWasSuccessful {
                        backup_name: backup_name.to_string(),
                        kept: report.kept(),
                        deleted: report.deleted(),
                        failed: report.failed(),
                        skipped: report.skipped(),
                    });
                }
                Ok(report)
            }
            Err(source) => {
                let err = AggregateRunError {
                    backup_name: backup_name.to_string(),
                    attempts: outcome.attempts,
                    source,
                };
                error!("{}", err);
                notifier.notify(BackupEvent::CleanupHasFailed {
                    backup_name: backup_name.to_string(),
                    attempts: err.attempts,
                    error: err.source.to_string(),
                });
                Err(err)
            }
        }
    }
}
