//! Configuration module for backup-keeper
//!
//! This module handles loading, validating, and resolving configuration from TOML files.
//!
//! ## Example Usage
//!
//! ```no_run
//! use backup_keeper::config;
//!
//! let config = config::load_config("backup-keeper.toml")?;
//!
//! for monitor in config::resolve_monitors(&config) {
//!     println!("Monitoring {} on {:?}", monitor.name, monitor.disks);
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    load_config, megabytes_to_bytes, resolve_monitors, validate_config, ConfigError,
    ResolvedMonitor, Result,
};
pub use types::*;

use crate::utils::retry::RetryPolicy;
use std::time::Duration;

/// Build the retry policy for one operation kind, honouring a CLI override
pub fn retry_policy(settings: &RetrySettings, tries_override: Option<u32>) -> RetryPolicy {
    let tries = tries_override.unwrap_or(settings.tries);
    let delay = (settings.delay_seconds > 0).then(|| Duration::from_secs(settings.delay_seconds));
    RetryPolicy::new(tries, delay)
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
