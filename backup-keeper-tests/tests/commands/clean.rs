//! Tests for the 'clean' command
//!
//! The clean command applies the configured retention to every backup disk,
//! with retries and notifications.

use backup_keeper::config::{retry_policy, NotificationConfig, NotifyEvent, RetentionConfig};
use backup_keeper::managers::cleanup::{CleanupExecutor, CleanupOutcome, CleanupPlan, CleanupReport};
use backup_keeper::managers::notification::{BackupEvent, NotificationManager};
use backup_keeper::AggregateRunError;
use chrono::Utc;
use test_utils::{days, hours, CollectingSink, ConfigBuilder, TestContext};

async fn clean(
    ctx: &TestContext,
    sink: &CollectingSink,
) -> Result<CleanupReport, AggregateRunError> {
    let config = ctx.config();
    let notifier = NotificationManager::new(config.notifications.clone(), Box::new(sink.clone()));

    CleanupExecutor::default()
        .run_with_retry(
            &config.backup.name,
            &retry_policy(&config.retry.cleanup, None),
            &notifier,
            || CleanupPlan::from_config(config, ctx.registry()),
        )
        .await
}

fn everything_notified() -> NotificationConfig {
    NotificationConfig {
        notify_on: vec![NotifyEvent::Success, NotifyEvent::Failure],
    }
}

#[tokio::test]
async fn test_clean_removes_expired_backups() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_keep_all_days(3));
    ctx.write_archive("local", "my-site.com/2.zip", days(2), 1);
    ctx.write_archive("local", "my-site.com/4.zip", days(4), 1);
    ctx.write_archive("local", "my-site.com/9.zip", days(9), 1);
    ctx.write_archive("local", "other-site.com/9.zip", days(9), 1);

    let report = clean(&ctx, &CollectingSink::new()).await.unwrap();

    assert_eq!(report.deleted(), 2);
    assert_eq!(
        ctx.files_on("local"),
        vec!["my-site.com/2.zip", "other-site.com/9.zip"]
    );
}

#[tokio::test]
async fn test_clean_keeps_daily_backups() {
    let retention = RetentionConfig {
        keep_all_backups_for_days: 1,
        keep_daily_backups_for_days: 5,
        keep_weekly_backups_for_weeks: 0,
        keep_monthly_backups_for_months: 0,
        keep_yearly_backups_for_years: 0,
        delete_oldest_backups_when_using_more_megabytes_than: 0,
    };
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_retention(retention));
    // Two backups at noon and 11:00 on the same day, about three days ago
    let now = Utc::now();
    let noon = (now - days(3))
        .date_naive()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc();
    ctx.write_archive("local", "my-site.com/now.zip", hours(1), 1);
    ctx.write_archive("local", "my-site.com/d3-late.zip", now - noon, 1);
    ctx.write_archive("local", "my-site.com/d3-early.zip", now - noon + hours(1), 1);

    let report = clean(&ctx, &CollectingSink::new()).await.unwrap();

    assert_eq!(report.kept(), 2);
    assert!(!ctx.files_on("local").contains(&"my-site.com/d3-early.zip".to_string()));
}

#[tokio::test]
async fn test_clean_storage_limit() {
    let mut retention = RetentionConfig::default();
    retention.delete_oldest_backups_when_using_more_megabytes_than = 1;
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_retention(retention));
    let megabyte = 1024 * 1024;
    ctx.write_archive("local", "my-site.com/new.zip", hours(1), megabyte / 2);
    ctx.write_archive("local", "my-site.com/mid.zip", hours(2), megabyte / 2);
    ctx.write_archive("local", "my-site.com/old.zip", hours(3), megabyte / 2);

    let report = clean(&ctx, &CollectingSink::new()).await.unwrap();

    assert_eq!(report.deleted(), 1);
    assert_eq!(ctx.files_on("local"), vec!["my-site.com/mid.zip", "my-site.com/new.zip"]);
}

#[tokio::test]
async fn test_clean_skips_unreachable_disk_and_notifies_success() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_missing_disk("nas")
            .with_backup_disks(&["nas", "local"])
            .with_keep_all_days(1)
            .with_notifications(everything_notified()),
    );
    ctx.write_archive("local", "my-site.com/a.zip", hours(1), 1);
    ctx.write_archive("local", "my-site.com/b.zip", days(5), 1);
    let sink = CollectingSink::new();

    let report = clean(&ctx, &sink).await.unwrap();

    assert!(matches!(report.destinations[0].outcome, CleanupOutcome::Skipped { .. }));
    assert_eq!(report.destinations[1].disk_name, "local");
    assert!(matches!(
        sink.events().as_slice(),
        [BackupEvent::CleanupWasSuccessful {
            deleted: 1,
            skipped: 1,
            ..
        }]
    ));
}

#[tokio::test]
async fn test_clean_empty_destination() {
    let ctx = TestContext::with_minimal_config();

    let report = clean(&ctx, &CollectingSink::new()).await.unwrap();

    assert_eq!(report.processed(), 1);
    assert_eq!(report.kept(), 0);
    assert_eq!(report.deleted(), 0);
}

#[tokio::test]
async fn test_clean_report_as_json() {
    let ctx = TestContext::with_minimal_config();
    ctx.write_archive("local", "my-site.com/a.zip", hours(1), 1);

    let report = clean(&ctx, &CollectingSink::new()).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["cancelled"], false);
    assert_eq!(json["destinations"][0]["status"], "cleaned");
    assert_eq!(json["destinations"][0]["kept"], 1);
}
