//! Destination and inventory behaviour on real local disks

use backup_keeper::destination::{Destination, DestinationError};
use backup_keeper::storage::{Disk, LocalDisk};
use std::fs;
use std::sync::Arc;
use test_utils::{days, hours, sample_archive, ConfigBuilder, TestContext};

fn local_destination(ctx: &TestContext, backup_name: &str) -> Destination {
    Destination::create(ctx.registry(), "local", backup_name).unwrap()
}

#[test]
fn test_inventory_only_lists_archives_of_the_backup() {
    let ctx = TestContext::with_minimal_config();
    ctx.write_archive("local", "my-site.com/old.zip", days(3), 10);
    ctx.write_archive("local", "my-site.com/new.zip", hours(1), 20);
    ctx.write_archive("local", "my-site.com/notes.txt", hours(1), 5);
    ctx.write_archive("local", "other-site.com/foreign.zip", hours(2), 30);

    let inventory = local_destination(&ctx, "my-site.com").get_backups();

    let paths: Vec<_> = inventory.iter().map(|r| r.path().to_string()).collect();
    assert_eq!(paths, vec!["my-site.com/new.zip", "my-site.com/old.zip"]);
    assert_eq!(inventory.size().unwrap(), 30);
}

#[test]
fn test_backup_name_is_sanitized_into_prefix() {
    let ctx = TestContext::with_minimal_config();
    ctx.write_archive("local", "my-site-com-staging/a.zip", hours(1), 1);

    let destination = local_destination(&ctx, "my site.com/staging");

    assert_eq!(destination.backup_name(), "my-site.com-staging");
    assert!(destination.get_backups().is_empty());
    assert_eq!(
        local_destination(&ctx, "my-site-com staging").get_backups().count(),
        1
    );
}

#[test]
fn test_missing_root_is_unreachable() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_missing_disk("offline")
            .with_backup_disks(&["offline"]),
    );
    let destination = Destination::create(ctx.registry(), "offline", "my-site.com").unwrap();

    assert!(!destination.is_reachable());
    assert!(destination.connection_error().is_some());
    assert!(destination.get_backups().is_empty());
    assert_eq!(destination.used_storage(), 0);
    assert!(matches!(
        destination.try_get_backups(),
        Err(DestinationError::List { .. })
    ));
}

#[test]
fn test_connection_error_cleared_once_reachable() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_missing_disk("later"));
    let destination = Destination::create(ctx.registry(), "later", "my-site.com").unwrap();
    assert!(!destination.is_reachable());

    fs::create_dir_all(ctx.disk_root("later")).unwrap();

    assert!(destination.is_reachable());
    assert_eq!(destination.connection_error(), None);
}

#[test]
fn test_unknown_disk() {
    let ctx = TestContext::with_minimal_config();
    let result = Destination::create(ctx.registry(), "s3", "my-site.com");

    assert!(matches!(result, Err(DestinationError::UnknownDisk { .. })));
}

#[test]
fn test_written_archive_becomes_newest() {
    let ctx = TestContext::with_minimal_config();
    ctx.write_archive("local", "my-site.com/yesterday.zip", days(1), 8);
    let archive = sample_archive(ctx.temp_dir(), "today.zip");
    let destination = local_destination(&ctx, "my-site.com");

    let written = destination.write(&archive).unwrap();

    let inventory = destination.get_backups();
    assert_eq!(inventory.count(), 2);
    assert_eq!(inventory.newest().unwrap().path(), "my-site.com/today.zip");
    assert_eq!(inventory.newest().unwrap().size().unwrap(), written);
}

#[test]
fn test_oldest_skips_records_deleted_elsewhere() {
    let ctx = TestContext::with_minimal_config();
    ctx.write_archive("local", "my-site.com/a.zip", days(1), 1);
    ctx.write_archive("local", "my-site.com/b.zip", days(2), 1);
    ctx.write_archive("local", "my-site.com/c.zip", days(3), 1);
    let inventory = local_destination(&ctx, "my-site.com").get_backups();

    fs::remove_file(ctx.disk_root("local").join("my-site.com/c.zip")).unwrap();

    assert_eq!(inventory.oldest().unwrap().unwrap().path(), "my-site.com/b.zip");
    assert_eq!(inventory.size().unwrap(), 2);
}

#[test]
fn test_deleting_missing_record_is_not_an_error() {
    let ctx = TestContext::with_minimal_config();
    ctx.write_archive("local", "my-site.com/a.zip", days(1), 1);
    let destination = local_destination(&ctx, "my-site.com");
    let inventory = destination.get_backups();
    let record = inventory.newest().unwrap();

    destination.delete(record).unwrap();
    destination.delete(record).unwrap();

    assert!(!record.exists().unwrap());
}

#[test]
fn test_local_disk_rejects_escaping_paths() {
    let ctx = TestContext::with_minimal_config();
    let disk = Arc::new(LocalDisk::new(ctx.disk_root("local")));

    assert!(disk.delete("../backup-keeper.toml").is_err());
    assert!(disk.write_stream("/etc/x.zip", &mut "x".as_bytes()).is_err());
}
