//! Health evaluation and health notifications

use backup_keeper::config::{NotificationConfig, NotifyEvent};
use backup_keeper::destination::Destination;
use backup_keeper::managers::health::{notify_health, HealthEvaluator, HealthThresholds};
use backup_keeper::managers::notification::NotificationManager;
use std::sync::Arc;
use test_utils::{
    days, fixed_now, hours, mock_disk_with_ages, CollectingSink, MockDisk, TestContext,
};

const ONE_DAY: HealthThresholds = HealthThresholds {
    max_age_days: 1,
    max_storage_bytes: 0,
};

fn destination(name: &str, disk: MockDisk) -> Arc<Destination> {
    Arc::new(Destination::new(Arc::new(disk), name, "my-site.com"))
}

#[test]
fn test_recent_backup_is_healthy() {
    let disk = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 10), (3, 10)]);

    let status = HealthEvaluator::at(fixed_now()).evaluate(&destination("memory", disk), ONE_DAY);

    assert!(status.reachable);
    assert!(status.healthy);
    assert_eq!(status.backup_count, 2);
    assert_eq!(status.used_storage_bytes, 20);
    assert!(status.problems().is_empty());
}

#[test]
fn test_stale_backup_is_unhealthy() {
    let disk = MockDisk::new().with_object("my-site.com/a.zip", fixed_now() - hours(25), 1);

    let status = HealthEvaluator::at(fixed_now()).evaluate(&destination("memory", disk), ONE_DAY);

    assert!(status.newest_too_old);
    assert!(!status.healthy);
    assert_eq!(status.problems(), vec!["newest backup is too old"]);
    assert_eq!(status.newest_age_days(fixed_now()), Some(1));
}

#[test]
fn test_no_backups_is_unhealthy() {
    let status =
        HealthEvaluator::at(fixed_now()).evaluate(&destination("memory", MockDisk::new()), ONE_DAY);

    assert!(status.reachable);
    assert!(!status.healthy);
    assert_eq!(status.problems(), vec!["no backups present"]);
}

#[test]
fn test_storage_threshold() {
    let disk = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 600), (1, 600)]);
    let thresholds = HealthThresholds {
        max_age_days: 1,
        max_storage_bytes: 1000,
    };

    let status =
        HealthEvaluator::at(fixed_now()).evaluate(&destination("memory", disk), thresholds);

    assert!(status.too_much_storage_used);
    assert!(!status.newest_too_old);
    assert!(!status.healthy);
}

#[test]
fn test_unreachable_destination() {
    let status = HealthEvaluator::at(fixed_now())
        .evaluate(&destination("down", MockDisk::new().with_unreachable()), ONE_DAY);

    assert!(!status.reachable);
    assert!(!status.healthy);
    assert!(status.connection_error.is_some());
    assert_eq!(status.backup_count, 0);
}

#[test]
fn test_local_disk_health_uses_file_times() {
    let ctx = TestContext::with_minimal_config();
    ctx.write_archive("local", "my-site.com/a.zip", days(3), 10);
    let destination = Destination::create(ctx.registry(), "local", "my-site.com").unwrap();

    let status = HealthEvaluator::new().evaluate(&destination, ONE_DAY);

    assert!(status.newest_too_old);
    assert_eq!(status.newest_age_days(chrono::Utc::now()), Some(3));
}

#[tokio::test]
async fn test_evaluate_all_keeps_input_order() {
    let healthy = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 1)]);
    let destinations = vec![
        (destination("down", MockDisk::new().with_unreachable()), ONE_DAY),
        (destination("healthy", healthy), ONE_DAY),
        (destination("empty", MockDisk::new()), ONE_DAY),
    ];

    let statuses = HealthEvaluator::at(fixed_now()).evaluate_all(destinations).await;

    let disks: Vec<_> = statuses.iter().map(|s| s.disk_name.as_str()).collect();
    assert_eq!(disks, vec!["down", "healthy", "empty"]);
    assert_eq!(
        statuses.iter().map(|s| s.healthy).collect::<Vec<_>>(),
        vec![false, true, false]
    );
}

#[tokio::test]
async fn test_notifications_follow_configured_events() {
    let healthy = mock_disk_with_ages("my-site.com", fixed_now(), &[(0, 1)]);
    let statuses = HealthEvaluator::at(fixed_now())
        .evaluate_all(vec![
            (destination("healthy", healthy), ONE_DAY),
            (destination("empty", MockDisk::new()), ONE_DAY),
        ])
        .await;

    let sink = CollectingSink::new();
    let notifier = NotificationManager::new(NotificationConfig::default(), Box::new(sink.clone()));
    notify_health(&statuses, &notifier);
    assert_eq!(sink.names(), vec!["UnhealthyBackupWasFound"]);

    let sink = CollectingSink::new();
    let config = NotificationConfig {
        notify_on: vec![NotifyEvent::Healthy, NotifyEvent::Unhealthy],
    };
    notify_health(&statuses, &NotificationManager::new(config, Box::new(sink.clone())));
    assert_eq!(sink.names(), vec!["HealthyBackupWasFound", "UnhealthyBackupWasFound"]);

    let sink = CollectingSink::new();
    let muted = NotificationManager::new(NotificationConfig::default(), Box::new(sink.clone()))
        .disabled(true);
    notify_health(&statuses, &muted);
    assert!(sink.events().is_empty());
}
