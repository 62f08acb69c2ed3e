//! Tiered retention
//!
//! Walking back from now, the timeline is cut into consecutive periods:
//!
//! ```text
//! now ── keep all ── daily ── weekly ── monthly ── yearly ── (expired)
//! ```
//!
//! Everything in the first period is kept. In each later period one backup per
//! day, ISO week, month or year is kept, namely the newest one of that bucket.
//! Expired backups are deleted. Afterwards, if a storage limit is set, the
//! oldest kept backups are deleted until the listed total fits. The newest
//! backup is never deleted.

use super::{PolicyError, RetentionDecision, RetentionPolicy};
use crate::config::{megabytes_to_bytes, RetentionConfig};
use crate::destination::BackupInventory;
use chrono::{DateTime, Months, TimeDelta, Utc};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Tier {
    All,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Expired,
}

/// Start of each period, each one earlier than (or equal to) the previous
#[derive(Debug, Clone, Copy)]
struct Periods {
    all: DateTime<Utc>,
    daily: DateTime<Utc>,
    weekly: DateTime<Utc>,
    monthly: DateTime<Utc>,
    yearly: DateTime<Utc>,
}

impl Periods {
    fn tier_of(&self, timestamp: DateTime<Utc>) -> Tier {
        if timestamp >= self.all {
            Tier::All
        } else if timestamp >= self.daily {
            Tier::Daily
        } else if timestamp >= self.weekly {
            Tier::Weekly
        } else if timestamp >= self.monthly {
            Tier::Monthly
        } else if timestamp >= self.yearly {
            Tier::Yearly
        } else {
            Tier::Expired
        }
    }
}

fn bucket_key(tier: Tier, timestamp: DateTime<Utc>) -> Option<String> {
    let format = match tier {
        Tier::Daily => "%Y-%m-%d",
        Tier::Weekly => "%G-W%V",
        Tier::Monthly => "%Y-%m",
        Tier::Yearly => "%Y",
        Tier::All | Tier::Expired => return None,
    };
    Some(timestamp.format(format).to_string())
}

fn out_of_range(field: &'static str) -> PolicyError {
    PolicyError::InvalidSetting {
        field,
        reason: "period reaches outside the supported date range".to_string(),
    }
}

fn minus_days(
    from: DateTime<Utc>,
    days: i64,
    field: &'static str,
) -> Result<DateTime<Utc>, PolicyError> {
    TimeDelta::try_days(days)
        .and_then(|delta| from.checked_sub_signed(delta))
        .ok_or_else(|| out_of_range(field))
}

fn minus_months(
    from: DateTime<Utc>,
    months: Option<u32>,
    field: &'static str,
) -> Result<DateTime<Utc>, PolicyError> {
    months
        .and_then(|m| from.checked_sub_months(Months::new(m)))
        .ok_or_else(|| out_of_range(field))
}

/// Keep-all, daily, weekly, monthly and yearly buckets plus an optional
/// storage limit
#[derive(Debug, Clone)]
pub struct TieredRetention {
    config: RetentionConfig,
    max_storage_bytes: Option<u64>,
    now: Option<DateTime<Utc>>,
}

impl TieredRetention {
    /// Policy evaluated against the current time
    pub fn new(config: &RetentionConfig) -> Result<Self, PolicyError> {
        let megabytes = config.delete_oldest_backups_when_using_more_megabytes_than;
        let policy = Self {
            config: config.clone(),
            max_storage_bytes: (megabytes > 0).then(|| megabytes_to_bytes(megabytes)),
            now: None,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Policy evaluated against a fixed point in time
    pub fn at(config: &RetentionConfig, now: DateTime<Utc>) -> Result<Self, PolicyError> {
        let mut policy = Self::new(config)?;
        policy.now = Some(now);
        policy.validate()?;
        Ok(policy)
    }

    /// Override the storage limit in bytes (`None` disables it)
    pub fn with_max_storage_bytes(mut self, max_storage_bytes: Option<u64>) -> Self {
        self.max_storage_bytes = max_storage_bytes;
        self
    }

    pub fn max_storage_bytes(&self) -> Option<u64> {
        self.max_storage_bytes
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn periods(&self, now: DateTime<Utc>) -> Result<Periods, PolicyError> {
        let c = &self.config;

        let all = minus_days(
            now,
            c.keep_all_backups_for_days.into(),
            "keep_all_backups_for_days",
        )?;
        let daily = minus_days(
            all,
            c.keep_daily_backups_for_days.into(),
            "keep_daily_backups_for_days",
        )?;
        let weekly = minus_days(
            daily,
            i64::from(c.keep_weekly_backups_for_weeks) * 7,
            "keep_weekly_backups_for_weeks",
        )?;
        let monthly = minus_months(
            weekly,
            Some(c.keep_monthly_backups_for_months),
            "keep_monthly_backups_for_months",
        )?;
        let yearly = minus_months(
            monthly,
            c.keep_yearly_backups_for_years.checked_mul(12),
            "keep_yearly_backups_for_years",
        )?;

        Ok(Periods {
            all,
            daily,
            weekly,
            monthly,
            yearly,
        })
    }
}

impl RetentionPolicy for TieredRetention {
    fn name(&self) -> &'static str {
        "tiered"
    }

    fn validate(&self) -> Result<(), PolicyError> {
        let c = &self.config;
        let window = [
            c.keep_all_backups_for_days,
            c.keep_daily_backups_for_days,
            c.keep_weekly_backups_for_weeks,
            c.keep_monthly_backups_for_months,
            c.keep_yearly_backups_for_years,
        ];
        if window.iter().all(|&period| period == 0) {
            return Err(PolicyError::EmptyRetentionWindow);
        }

        self.periods(self.now()).map(|_| ())
    }

    fn apply(&self, inventory: &BackupInventory) -> Result<RetentionDecision, PolicyError> {
        let periods = self.periods(self.now())?;
        let records = inventory.records();

        let mut keep = vec![false; records.len()];
        let mut seen_buckets: HashSet<(Tier, String)> = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let tier = periods.tier_of(record.timestamp());
            keep[index] = match tier {
                Tier::All => true,
                Tier::Expired => index == 0,
                _ => match bucket_key(tier, record.timestamp()) {
                    Some(bucket) => seen_buckets.insert((tier, bucket)),
                    None => false,
                },
            };
        }

        if let Some(max_bytes) = self.max_storage_bytes {
            let mut total: u64 = records
                .iter()
                .zip(&keep)
                .filter(|(_, kept)| **kept)
                .map(|(record, _)| record.listed_size())
                .sum();
            let mut kept_count = keep.iter().filter(|k| **k).count();

            // Oldest first, never the last survivor
            for index in (0..records.len()).rev() {
                if total <= max_bytes || kept_count <= 1 {
                    break;
                }
                if keep[index] {
                    keep[index] = false;
                    kept_count -= 1;
                    total = total.saturating_sub(records[index].listed_size());
                    debug!(
                        "Storage limit exceeded, dropping {} ({} bytes still kept)",
                        records[index].path(),
                        total
                    );
                }
            }
        }

        Ok(RetentionDecision::from_flags(inventory, &keep))
    }
}
