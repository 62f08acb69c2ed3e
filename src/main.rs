use anyhow::{Context, Result};
use backup_keeper::config::{self, Config};
use backup_keeper::destination::{create_destinations, sanitize_backup_name};
use backup_keeper::managers::backup::BackupManager;
use backup_keeper::managers::cleanup::{
    CleanupExecutor, CleanupOutcome, CleanupPlan, CleanupReport,
};
use backup_keeper::managers::health::{
    monitored_destinations, notify_health, HealthEvaluator, HealthStatus,
};
use backup_keeper::managers::logging::{self, LoggingConfig};
use backup_keeper::managers::notification::NotificationManager;
use backup_keeper::storage::DiskRegistry;
use backup_keeper::utils::format::{describe_age, human_readable_size, status_mark};
use backup_keeper::utils::RunLock;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Parser)]
#[command(name = "backup-keeper")]
#[command(about = "Inventory, retention and health checks for backup archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "backup-keeper.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show health of every monitored backup
    List {
        /// Print statuses as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check health, notify, and exit non-zero if anything is unhealthy
    Monitor {
        #[arg(long)]
        disable_notifications: bool,
    },

    /// Delete backups the retention policy no longer keeps
    Clean {
        #[arg(long)]
        disable_notifications: bool,

        /// Override the configured number of attempts
        #[arg(long)]
        tries: Option<u32>,

        /// Print the cleanup report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy a finished archive to every configured disk
    Backup {
        /// The .zip archive to copy
        #[arg(short, long)]
        archive: PathBuf,

        #[arg(long)]
        disable_notifications: bool,

        /// Override the configured number of attempts
        #[arg(long)]
        tries: Option<u32>,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    let command = cli.command.unwrap_or(Commands::List { json: false });

    if let Commands::Validate = command {
        logging::init_console_logging();
        print_config_summary(&config);
        return Ok(ExitCode::SUCCESS);
    }

    // Keep the guard alive until exit so buffered log lines are flushed
    let _log_guard = logging::init_logging(&LoggingConfig::from_config(&config.global))?;

    let registry = DiskRegistry::from_config(&config.disks);
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match command {
        Commands::List { json } => {
            let statuses = evaluate_monitors(&config, &registry).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                print_health_table(&statuses);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Monitor {
            disable_notifications,
        } => {
            let statuses = evaluate_monitors(&config, &registry).await?;
            let notifier = notifier(&config, disable_notifications);
            notify_health(&statuses, &notifier);

            let mut all_healthy = true;
            for status in &statuses {
                if status.healthy {
                    println!("✓ {} on {} is healthy", status.backup_name, status.disk_name);
                } else {
                    all_healthy = false;
                    println!(
                        "✗ {} on {} is unhealthy: {}",
                        status.backup_name,
                        status.disk_name,
                        status.problems().join(", ")
                    );
                }
            }

            Ok(if all_healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Clean {
            disable_notifications,
            tries,
            json,
        } => {
            let mut lock = open_lock(&config)?;
            let _guard = lock.try_acquire()?;

            let retry = config::retry_policy(&config.retry.cleanup, tries);
            let notifier = notifier(&config, disable_notifications);
            let executor = CleanupExecutor::new(cancel);

            let report = executor
                .run_with_retry(&config.backup.name, &retry, &notifier, || {
                    CleanupPlan::from_config(&config, &registry)
                })
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_cleanup_report(&report);
            }

            let incomplete = report.failed() > 0 || report.errored() > 0;
            Ok(if report.cancelled || incomplete {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Commands::Backup {
            archive,
            disable_notifications,
            tries,
        } => {
            let mut lock = open_lock(&config)?;
            let _guard = lock.try_acquire()?;

            let destinations =
                create_destinations(&registry, &config.backup.name, &config.backup.disks)?;
            let manager = BackupManager::new(
                &config.backup.name,
                destinations,
                config::retry_policy(&config.retry.backup, tries),
                notifier(&config, disable_notifications),
            )
            .with_cancel_token(cancel);

            let report = manager.copy_archive(&archive).await;
            for written in &report.written {
                println!(
                    "✓ {} → {} ({})",
                    written.disk_name,
                    written.path,
                    human_readable_size(written.bytes)
                );
            }
            for failed in &report.failed {
                println!("✗ {}: {}", failed.disk_name, failed.error);
            }

            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Validate => Ok(ExitCode::SUCCESS),
    }
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight operations");
            cancel.cancel();
        }
    });
}

fn notifier(config: &Config, disable_notifications: bool) -> NotificationManager {
    NotificationManager::with_log_sink(config.notifications.clone()).disabled(disable_notifications)
}

fn open_lock(config: &Config) -> Result<RunLock> {
    let directory = config::expand_tilde(&config.global.lock_directory);
    RunLock::open(&directory, &sanitize_backup_name(&config.backup.name))
}

async fn evaluate_monitors(config: &Config, registry: &DiskRegistry) -> Result<Vec<HealthStatus>> {
    let destinations = monitored_destinations(config, registry)?;
    Ok(HealthEvaluator::new().evaluate_all(destinations).await)
}

fn print_health_table(statuses: &[HealthStatus]) {
    let now = Utc::now();

    println!(
        "{:<25} {:<12} {:<10} {:<8} {:>12} {:<16} {:>14}",
        "Name", "Disk", "Reachable", "Healthy", "# of backups", "Newest backup", "Used storage"
    );
    println!("{}", "-".repeat(103));

    for status in statuses {
        let (count, newest, used) = if status.reachable {
            (
                status.backup_count.to_string(),
                status
                    .newest_backup
                    .map(|ts| describe_age(ts, now))
                    .unwrap_or_else(|| "No backups present".to_string()),
                human_readable_size(status.used_storage_bytes),
            )
        } else {
            ("/".to_string(), "/".to_string(), "/".to_string())
        };

        println!(
            "{:<25} {:<12} {:<10} {:<8} {:>12} {:<16} {:>14}",
            status.backup_name,
            status.disk_name,
            status_mark(status.reachable),
            status_mark(status.healthy),
            count,
            newest,
            used
        );
    }

    let unreachable: Vec<_> = statuses.iter().filter(|s| !s.reachable).collect();
    if !unreachable.is_empty() {
        println!("\nUnreachable backup disks:");
        for status in unreachable {
            println!(
                "  {} on {}: {}",
                status.backup_name,
                status.disk_name,
                status.connection_error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

fn print_cleanup_report(report: &CleanupReport) {
    for destination in &report.destinations {
        match &destination.outcome {
            CleanupOutcome::Cleaned {
                kept,
                deleted,
                failed,
            } => {
                println!(
                    "{} {} on {}: {} kept, {} deleted",
                    status_mark(failed.is_empty()),
                    destination.backup_name,
                    destination.disk_name,
                    kept,
                    deleted
                );
                for failure in failed {
                    println!("    could not delete {}: {}", failure.path, failure.error);
                }
            }
            CleanupOutcome::Skipped { reason } => println!(
                "- {} on {}: skipped ({})",
                destination.backup_name, destination.disk_name, reason
            ),
            CleanupOutcome::Cancelled => println!(
                "- {} on {}: cancelled",
                destination.backup_name, destination.disk_name
            ),
            CleanupOutcome::Failed { error } => println!(
                "✗ {} on {}: {}",
                destination.backup_name, destination.disk_name, error
            ),
        }
    }

    println!(
        "\nTotal: {} deleted, {} failed, {} destination(s) skipped, {} errored",
        report.deleted(),
        report.failed(),
        report.skipped(),
        report.errored()
    );
}

fn print_config_summary(config: &Config) {
    println!("✓ Configuration is valid");
    println!();
    println!("Backup: {} ({})", config.backup.name, sanitize_backup_name(&config.backup.name));
    println!("Disks: {}", config.backup.disks.join(", "));
    println!(
        "Retention: all {}d, daily {}d, weekly {}w, monthly {}m, yearly {}y",
        config.cleanup.keep_all_backups_for_days,
        config.cleanup.keep_daily_backups_for_days,
        config.cleanup.keep_weekly_backups_for_weeks,
        config.cleanup.keep_monthly_backups_for_months,
        config.cleanup.keep_yearly_backups_for_years
    );
    match config.cleanup.delete_oldest_backups_when_using_more_megabytes_than {
        0 => println!("Storage limit: none"),
        mb => println!("Storage limit: {} MB", mb),
    }
    for monitor in config::resolve_monitors(config) {
        println!(
            "Monitor: {} on {} (max age {}d)",
            monitor.name,
            monitor.disks.join(", "),
            monitor.max_age_days
        );
    }
}
