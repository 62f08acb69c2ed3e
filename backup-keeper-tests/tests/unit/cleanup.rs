//! Cleanup executor flows

use backup_keeper::config::{NotificationConfig, NotifyEvent, RetentionConfig};
use backup_keeper::destination::{BackupInventory, Destination};
use backup_keeper::managers::cleanup::{
    CleanupError, CleanupExecutor, CleanupOutcome, CleanupPlan,
};
use backup_keeper::managers::notification::{BackupEvent, NotificationManager};
use backup_keeper::retention::{PolicyError, RetentionDecision, RetentionPolicy, TieredRetention};
use backup_keeper::utils::RetryPolicy;
use std::cell::Cell;
use std::sync::Arc;
use test_utils::{
    days, fixed_now, mock_disk_with_ages, CollectingSink, ConfigBuilder, MockDisk, TestContext,
};
use tokio_util::sync::CancellationToken;

fn keep_days(days: u32) -> RetentionConfig {
    RetentionConfig {
        keep_all_backups_for_days: days,
        keep_daily_backups_for_days: 0,
        keep_weekly_backups_for_weeks: 0,
        keep_monthly_backups_for_months: 0,
        keep_yearly_backups_for_years: 0,
        delete_oldest_backups_when_using_more_megabytes_than: 0,
    }
}

fn policy(days: u32) -> Arc<dyn RetentionPolicy> {
    Arc::new(TieredRetention::at(&keep_days(days), fixed_now()).unwrap())
}

fn destination(name: &str, disk: &MockDisk) -> Arc<Destination> {
    Arc::new(Destination::new(Arc::new(disk.clone()), name, "my-site.com"))
}

/// Tiered policy that refuses inventories larger than `max_records`
struct CappedPolicy {
    inner: TieredRetention,
    max_records: usize,
}

impl RetentionPolicy for CappedPolicy {
    fn name(&self) -> &'static str {
        "capped"
    }

    fn validate(&self) -> Result<(), PolicyError> {
        self.inner.validate()
    }

    fn apply(&self, inventory: &BackupInventory) -> Result<RetentionDecision, PolicyError> {
        if inventory.count() > self.max_records {
            return Err(PolicyError::InvalidSetting {
                field: "max_records",
                reason: format!("{} records found", inventory.count()),
            });
        }
        self.inner.apply(inventory)
    }
}

fn notifier(sink: &CollectingSink) -> NotificationManager {
    let config = NotificationConfig {
        notify_on: vec![NotifyEvent::Success, NotifyEvent::Failure],
    };
    NotificationManager::new(config, Box::new(sink.clone()))
}

#[tokio::test]
async fn test_cleans_every_local_destination() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_temp_disk("second")
            .with_backup_disks(&["local", "second"])
            .with_keep_all_days(2),
    );
    for disk in ["local", "second"] {
        ctx.write_archive(disk, "my-site.com/new.zip", days(1), 1);
        ctx.write_archive(disk, "my-site.com/old.zip", days(5), 1);
    }
    let policy: Arc<dyn RetentionPolicy> =
        Arc::new(TieredRetention::new(&ctx.config().cleanup).unwrap());

    let report = CleanupExecutor::default()
        .run(ctx.destinations().unwrap(), policy)
        .await
        .unwrap();

    assert_eq!(report.processed(), 2);
    assert_eq!(report.deleted(), 2);
    assert_eq!(report.kept(), 2);
    assert_eq!(ctx.files_on("local"), vec!["my-site.com/new.zip"]);
    assert_eq!(ctx.files_on("second"), vec!["my-site.com/new.zip"]);
}

#[tokio::test]
async fn test_unreachable_destination_is_skipped() {
    let reachable = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 1), (10, 1)]);
    let down =
        mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 1), (10, 1)]).with_unreachable();

    let report = CleanupExecutor::default()
        .run(vec![destination("down", &down), destination("up", &reachable)], policy(3))
        .await
        .unwrap();

    assert!(matches!(report.destinations[0].outcome, CleanupOutcome::Skipped { .. }));
    assert_eq!(report.skipped(), 1);
    assert_eq!(down.delete_count(), 0);
    assert_eq!(reachable.paths().len(), 1);
}

#[tokio::test]
async fn test_failed_deletion_does_not_stop_the_rest() {
    let now = fixed_now();
    let disk = mock_disk_with_ages("my-site.com", now, &[(0, 1), (10, 1), (20, 1), (30, 1)]);
    let stuck = test_utils::archive_path("my-site.com", now, days(20));
    let disk = disk.with_failing_delete(&stuck);

    let report = CleanupExecutor::default()
        .run(vec![destination("memory", &disk)], policy(3))
        .await
        .unwrap();

    match &report.destinations[0].outcome {
        CleanupOutcome::Cleaned { kept, deleted, failed } => {
            assert_eq!(*kept, 1);
            assert_eq!(*deleted, 2);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].path, stuck);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(disk.paths().len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_deletes_nothing() {
    let disk = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 1), (10, 1)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = CleanupExecutor::new(cancel)
        .run(vec![destination("memory", &disk)], policy(3))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.destinations[0].outcome, CleanupOutcome::Cancelled);
    assert_eq!(disk.delete_count(), 0);
}

#[tokio::test]
async fn test_policy_failure_is_reported_as_failure() {
    let small = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 1), (10, 1)]);
    let large = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 1), (10, 1), (20, 1)]);
    let sink = CollectingSink::new();

    let report = CleanupExecutor::default()
        .run_with_retry("my-site.com", &RetryPolicy::new(1, None), &notifier(&sink), || {
            Ok(CleanupPlan {
                destinations: vec![destination("small", &small), destination("large", &large)],
                policy: Arc::new(CappedPolicy {
                    inner: TieredRetention::at(&keep_days(3), fixed_now())?,
                    max_records: 2,
                }),
            })
        })
        .await
        .unwrap();

    assert!(matches!(report.destinations[1].outcome, CleanupOutcome::Failed { .. }));
    assert_eq!(report.errored(), 1);
    assert_eq!(report.skipped(), 0);
    assert_eq!(report.deleted(), 1);
    assert_eq!(large.delete_count(), 0);
    match sink.events().as_slice() {
        [BackupEvent::CleanupHasFailed { attempts, error, .. }] => {
            assert_eq!(*attempts, 1);
            assert!(error.contains("large"), "unexpected error: {}", error);
        }
        other => panic!("unexpected events: {:?}", other),
    }
}

#[tokio::test]
async fn test_setup_failures_are_retried() {
    let disk = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 1), (10, 1)]);
    let sink = CollectingSink::new();
    let attempts = Cell::new(0);

    let report = CleanupExecutor::default()
        .run_with_retry("my-site.com", &RetryPolicy::new(3, None), &notifier(&sink), || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                return Err(CleanupError::Setup("registry not ready".to_string()));
            }
            Ok(CleanupPlan {
                destinations: vec![destination("memory", &disk)],
                policy: policy(3),
            })
        })
        .await
        .unwrap();

    assert_eq!(attempts.get(), 3);
    assert_eq!(report.deleted(), 1);
    assert!(matches!(
        sink.events().as_slice(),
        [BackupEvent::CleanupWasSuccessful { deleted: 1, .. }]
    ));
}

#[tokio::test]
async fn test_exhausted_retries_notify_failure() {
    let sink = CollectingSink::new();

    let error = CleanupExecutor::default()
        .run_with_retry("my-site.com", &RetryPolicy::new(2, None), &notifier(&sink), || {
            Err(CleanupError::Setup("disk registry unavailable".to_string()))
        })
        .await
        .unwrap_err();

    assert_eq!(error.attempts, 2);
    assert!(matches!(
        sink.events().as_slice(),
        [BackupEvent::CleanupHasFailed { attempts: 2, .. }]
    ));
}

#[tokio::test]
async fn test_invalid_policy_fails_without_retry() {
    let sink = CollectingSink::new();
    let attempts = Cell::new(0);

    let error = CleanupExecutor::default()
        .run_with_retry("my-site.com", &RetryPolicy::new(5, None), &notifier(&sink), || {
            attempts.set(attempts.get() + 1);
            Err(TieredRetention::new(&keep_days(0)).unwrap_err().into())
        })
        .await
        .unwrap_err();

    assert_eq!(attempts.get(), 1);
    assert_eq!(error.attempts, 1);
    assert!(matches!(error.source, CleanupError::Policy(_)));
}
