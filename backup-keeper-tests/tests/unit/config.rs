//! Unit tests for configuration loading and validation

use backup_keeper::config::{load_config, resolve_monitors, retry_policy, ConfigError, NotifyEvent};
use std::fs;
use test_utils::{ConfigBuilder, ResultAssertions, TestContext};

#[test]
fn test_config_loading_valid() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_temp_disk("second"));
    let path = ctx.write_config().unwrap();

    let loaded = load_config(&path).assert_ok();
    assert!(loaded.disks.contains_key("local"));
    assert!(loaded.disks.contains_key("second"));
}

#[test]
fn test_template_config_loads() {
    let ctx = TestContext::with_minimal_config();
    let path = ctx.write_template_config();

    let config = load_config(&path).assert_ok();
    assert_eq!(config.cleanup.keep_daily_backups_for_days, 16);
    assert_eq!(config.retry.cleanup.tries, 1);
    assert_eq!(config.notifications.notify_on, vec![NotifyEvent::Failure, NotifyEvent::Unhealthy]);
}

#[test]
fn test_config_missing_file() {
    let result = load_config("/nonexistent/backup-keeper.toml");
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_config_invalid_toml() {
    let ctx = TestContext::with_minimal_config();
    let path = ctx.create_file("broken.toml", "[backup\nname = ");

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_backup_referencing_unknown_disk() {
    let (config, temp) = ConfigBuilder::minimal()
        .with_backup_disks(&["local", "s3"])
        .persist();
    let path = temp.path().join("config.toml");
    fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

    load_config(&path).assert_err_contains("s3");
}

#[test]
fn test_retention_without_window_rejected() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_keep_all_days(0));
    let path = ctx.write_config().unwrap();

    load_config(&path).assert_err_contains("every retention period is zero");
}

#[test]
fn test_monitor_defaults_to_backup() {
    let config = ConfigBuilder::minimal().build();
    let monitors = resolve_monitors(&config);

    assert_eq!(monitors.len(), 1);
    assert_eq!(monitors[0].name, "my-site.com");
    assert_eq!(monitors[0].disks, vec!["local"]);
    assert_eq!(monitors[0].max_age_days, 1);
}

#[test]
fn test_explicit_monitors_replace_default() {
    let config = ConfigBuilder::minimal()
        .add_temp_disk("offsite")
        .add_monitor("my-site.com", &["local"], 2, 100)
        .add_monitor("other-site.com", &["offsite"], 7, 0)
        .build();
    let monitors = resolve_monitors(&config);

    assert_eq!(monitors.len(), 2);
    assert_eq!(monitors[1].name, "other-site.com");
    assert_eq!(monitors[1].max_storage_bytes, 0);
    assert_eq!(monitors[0].max_storage_bytes, 100 * 1024 * 1024);
}

#[test]
fn test_retry_policy_override() {
    let config = ConfigBuilder::minimal().with_cleanup_tries(4).build();

    let configured = retry_policy(&config.retry.cleanup, None);
    assert_eq!(configured.max_attempts(), 4);
    assert_eq!(configured.delay(), None);

    let overridden = retry_policy(&config.retry.cleanup, Some(0));
    assert_eq!(overridden.max_attempts(), 1);
}
