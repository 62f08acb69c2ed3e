//! Retention policies
//!
//! A policy looks at one destination's inventory and splits it into records to
//! keep and records to delete. It never touches the backend; deleting is the
//! cleanup executor's job.

pub mod tiered;

pub use tiered::TieredRetention;

use crate::destination::{BackupInventory, BackupRecord};

/// Invalid retention configuration, detected before anything is deleted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("every retention period is zero, nothing would ever be kept")]
    EmptyRetentionWindow,

    #[error("invalid retention setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// Partition of an inventory, both sides newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionDecision {
    pub keep: Vec<BackupRecord>,
    pub delete: Vec<BackupRecord>,
}

impl RetentionDecision {
    /// Split `inventory` by a per-record keep flag, preserving order
    pub(crate) fn from_flags(inventory: &BackupInventory, keep_flags: &[bool]) -> Self {
        let mut decision = Self::default();
        for (record, keep) in inventory.iter().zip(keep_flags) {
            if *keep {
                decision.keep.push(record.clone());
            } else {
                decision.delete.push(record.clone());
            }
        }
        decision
    }
}

/// Decides which backups survive a cleanup pass.
///
/// Implementations must be deterministic for a given inventory and must put
/// every record on exactly one side.
pub trait RetentionPolicy: Send + Sync {
    /// Policy name (for logging)
    fn name(&self) -> &'static str;

    /// Check the configuration without looking at any backups
    fn validate(&self) -> Result<(), PolicyError>;

    fn apply(&self, inventory: &BackupInventory) -> Result<RetentionDecision, PolicyError>;
}
