//! Destination health
//!
//! A destination is healthy when it can be listed, its newest backup is recent
//! enough and it stays below its storage limit. Evaluation only reads from the
//! backend.

use crate::config::{resolve_monitors, Config};
use crate::destination::{Destination, DestinationError};
use crate::managers::notification::{BackupEvent, NotificationManager};
use crate::storage::DiskRegistry;
use crate::utils::format::age_in_days;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Limits a destination is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    pub max_age_days: u32,
    /// 0 disables the storage check
    pub max_storage_bytes: u64,
}

/// Point-in-time health of one destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub backup_name: String,
    pub disk_name: String,
    pub reachable: bool,
    pub connection_error: Option<String>,
    pub backup_count: usize,
    pub newest_backup: Option<DateTime<Utc>>,
    pub used_storage_bytes: u64,
    pub newest_too_old: bool,
    pub too_much_storage_used: bool,
    pub healthy: bool,
}

impl HealthStatus {
    fn unreachable(destination: &Destination, connection_error: Option<String>) -> Self {
        Self {
            backup_name: destination.backup_name().to_string(),
            disk_name: destination.disk_name().to_string(),
            reachable: false,
            connection_error,
            backup_count: 0,
            newest_backup: None,
            used_storage_bytes: 0,
            newest_too_old: false,
            too_much_storage_used: false,
            healthy: false,
        }
    }

    /// Reasons this status is unhealthy, empty when healthy
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.reachable {
            problems.push(match &self.connection_error {
                Some(e) => format!("destination not reachable ({})", e),
                None => "destination not reachable".to_string(),
            });
        }
        if self.newest_too_old {
            problems.push(match self.newest_backup {
                Some(_) => "newest backup is too old".to_string(),
                None => "no backups present".to_string(),
            });
        }
        if self.too_much_storage_used {
            problems.push("too much storage used".to_string());
        }
        problems
    }

    /// Age of the newest backup in whole days
    pub fn newest_age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.newest_backup.map(|ts| age_in_days(ts, now))
    }
}

/// Computes [`HealthStatus`] values
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthEvaluator {
    now: Option<DateTime<Utc>>,
}

impl HealthEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator measuring ages against a fixed point in time
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }

    pub fn evaluate(
        &self,
        destination: &Destination,
        thresholds: HealthThresholds,
    ) -> HealthStatus {
        let now = self.now.unwrap_or_else(Utc::now);

        // One listing doubles as the reachability check
        let inventory = match destination.try_get_backups() {
            Ok(inventory) => inventory,
            Err(_) => {
                return HealthStatus::unreachable(destination, destination.connection_error());
            }
        };

        let newest_backup = inventory.newest().map(|record| record.timestamp());
        let used_storage_bytes = match inventory.size() {
            Ok(size) => size,
            Err(e) => {
                warn!(
                    "Could not size backups of '{}' on '{}', using listed sizes: {}",
                    destination.backup_name(),
                    destination.disk_name(),
                    e
                );
                inventory.iter().map(|record| record.listed_size()).sum()
            }
        };

        let newest_too_old = match newest_backup {
            None => true,
            Some(timestamp) => TimeDelta::try_days(thresholds.max_age_days.into())
                .map_or(false, |max_age| now.signed_duration_since(timestamp) > max_age),
        };
        let too_much_storage_used =
            thresholds.max_storage_bytes > 0 && used_storage_bytes > thresholds.max_storage_bytes;

        let status = HealthStatus {
            backup_name: destination.backup_name().to_string(),
            disk_name: destination.disk_name().to_string(),
            reachable: true,
            connection_error: None,
            backup_count: inventory.count(),
            newest_backup,
            used_storage_bytes,
            newest_too_old,
            too_much_storage_used,
            healthy: !newest_too_old && !too_much_storage_used,
        };

        debug!(
            "Health of {} on {}: healthy={}",
            status.backup_name, status.disk_name, status.healthy
        );
        status
    }

    /// Evaluate every destination concurrently, results in input order
    pub async fn evaluate_all(
        &self,
        destinations: Vec<(Arc<Destination>, HealthThresholds)>,
    ) -> Vec<HealthStatus> {
        let mut tasks = JoinSet::new();
        for (index, (destination, thresholds)) in destinations.iter().cloned().enumerate() {
            let evaluator = *self;
            tasks.spawn_blocking(move || (index, evaluator.evaluate(&destination, thresholds)));
        }

        let mut results: Vec<Option<HealthStatus>> = vec![None; destinations.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, status)) => results[index] = Some(status),
                Err(e) => warn!("Health evaluation task failed: {}", e),
            }
        }

        results
            .into_iter()
            .zip(&destinations)
            .map(|(status, (destination, _))| {
                status.unwrap_or_else(|| {
                    HealthStatus::unreachable(
                        destination,
                        Some("health evaluation did not complete".to_string()),
                    )
                })
            })
            .collect()
    }
}

/// Every monitored destination with its thresholds, in configuration order
pub fn monitored_destinations(
    config: &Config,
    registry: &DiskRegistry,
) -> Result<Vec<(Arc<Destination>, HealthThresholds)>, DestinationError> {
    let mut destinations = Vec::new();
    for monitor in resolve_monitors(config) {
        let thresholds = HealthThresholds {
            max_age_days: monitor.max_age_days,
            max_storage_bytes: monitor.max_storage_bytes,
        };
        for disk_name in &monitor.disks {
            let destination = Destination::create(registry, disk_name, &monitor.name)?;
            destinations.push((Arc::new(destination), thresholds));
        }
    }
    Ok(destinations)
}

/// Dispatch one healthy/unhealthy event per status
pub fn notify_health(statuses: &[HealthStatus], notifier: &NotificationManager) {
    for status in statuses {
        let event = if status.healthy {
            BackupEvent::HealthyBackupWasFound {
                status: status.clone(),
            }
        } else {
            BackupEvent::UnhealthyBackupWasFound {
                status: status.clone(),
            }
        };
        notifier.notify(event);
    }
}
