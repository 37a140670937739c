use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::io::gateway::StorageGateway;
use crate::io::store::{KeyValueStore, StoreError};
use crate::model::config::Limits;
use crate::model::{GlobalKey, parse_timestamp};
use crate::ops::scan::{SortMode, scan};

/// A rate-limited, purely informational notice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    StorageNearlyFull { percent: f64, used: usize },
    /// `hours_old` is `None` when no backup was ever taken.
    StaleBackup { hours_old: Option<i64> },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::StorageNearlyFull { percent, used } => write!(
                f,
                "storage is {percent:.1}% full ({:.2} MB used); export a backup and delete old tasks",
                *used as f64 / (1024.0 * 1024.0)
            ),
            Advisory::StaleBackup { hours_old: None } => {
                f.write_str("no backup has ever been created; consider exporting one")
            }
            Advisory::StaleBackup {
                hours_old: Some(hours),
            } => write!(
                f,
                "last backup is {} old; consider exporting a new one",
                describe_age(*hours)
            ),
        }
    }
}

/// Storage consumption snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageUsage {
    /// Keys plus values, in UTF-16 units
    pub used: usize,
    pub capacity: usize,
    pub percent: f64,
    pub items: usize,
    pub sessions: usize,
    pub last_backup: Option<DateTime<Utc>>,
}

pub fn storage_usage<S: KeyValueStore>(gateway: &StorageGateway<S>, limits: &Limits) -> StorageUsage {
    let used = gateway.estimated_size();
    StorageUsage {
        used,
        capacity: limits.storage_capacity,
        percent: percent_of(used, limits.storage_capacity),
        items: gateway.item_count(),
        sessions: scan(gateway, SortMode::Insertion).len(),
        last_backup: last_backup(gateway),
    }
}

fn percent_of(used: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        return 100.0;
    }
    used as f64 / capacity as f64 * 100.0
}

/// Time of the last export or import, if one was recorded.
pub fn last_backup<S: KeyValueStore>(gateway: &StorageGateway<S>) -> Option<DateTime<Utc>> {
    let raw = gateway.global(GlobalKey::LastBackup)?;
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Storage-capacity advisory. Fires above the configured percentage unless
/// one was issued within the cooldown; issuing one records the time.
pub fn check_storage<S: KeyValueStore>(
    gateway: &mut StorageGateway<S>,
    limits: &Limits,
) -> Result<Option<Advisory>, StoreError> {
    let used = gateway.estimated_size();
    let percent = percent_of(used, limits.storage_capacity);
    if percent <= limits.storage_warning_percent {
        return Ok(None);
    }
    if !cooldown_elapsed(gateway, GlobalKey::LastStorageWarning, limits.warning_cooldown_ms) {
        tracing::debug!(percent, "storage advisory suppressed by cooldown");
        return Ok(None);
    }
    record_warning(gateway, GlobalKey::LastStorageWarning)?;
    tracing::warn!(percent, used, "storage nearly full");
    Ok(Some(Advisory::StorageNearlyFull { percent, used }))
}

/// Stale-backup advisory. Fires when no backup exists or the last one is at
/// least `backup_stale_hours` old, subject to the same kind of cooldown.
pub fn check_backup<S: KeyValueStore>(
    gateway: &mut StorageGateway<S>,
    limits: &Limits,
) -> Result<Option<Advisory>, StoreError> {
    let hours_old = last_backup(gateway).map(|t| (gateway.now() - t).num_hours());
    if let Some(hours) = hours_old
        && hours < limits.backup_stale_hours
    {
        return Ok(None);
    }
    if !cooldown_elapsed(gateway, GlobalKey::LastBackupWarning, limits.warning_cooldown_ms) {
        return Ok(None);
    }
    record_warning(gateway, GlobalKey::LastBackupWarning)?;
    Ok(Some(Advisory::StaleBackup { hours_old }))
}

fn cooldown_elapsed<S: KeyValueStore>(
    gateway: &StorageGateway<S>,
    key: GlobalKey,
    cooldown_ms: i64,
) -> bool {
    match gateway.global(key).as_deref().and_then(parse_timestamp) {
        Some(last) => (gateway.now() - last).num_milliseconds() > cooldown_ms,
        None => true,
    }
}

fn record_warning<S: KeyValueStore>(
    gateway: &mut StorageGateway<S>,
    key: GlobalKey,
) -> Result<(), StoreError> {
    let now = gateway.now().timestamp_millis().to_string();
    gateway.set_global(key, &now)
}

/// "3 hours", "1 day", "2 days and 5 hours".
pub fn describe_age(hours: i64) -> String {
    let days = hours / 24;
    let rest = hours % 24;
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };
    match (days, rest) {
        (0, h) => plural(h, "hour"),
        (d, 0) => plural(d, "day"),
        (d, h) => format!("{} and {}", plural(d, "day"), plural(h, "hour")),
    }
}
