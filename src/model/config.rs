use serde::{Deserialize, Serialize};

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Timer delays, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    /// Quiet period before an edit is saved
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Quiet period before the task list is rescanned after typing
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    /// Unconditional rescan period, to pick up other tabs' edits
    #[serde(default = "default_background_refresh_ms")]
    pub background_refresh_ms: u64,
    /// How often storage usage is sampled
    #[serde(default = "default_storage_check_ms")]
    pub storage_check_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            debounce_ms: default_debounce_ms(),
            refresh_ms: default_refresh_ms(),
            background_refresh_ms: default_background_refresh_ms(),
            storage_check_ms: default_storage_check_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    1_000
}

fn default_refresh_ms() -> u64 {
    2_000
}

fn default_background_refresh_ms() -> u64 {
    30_000
}

fn default_storage_check_ms() -> u64 {
    300_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Advisory only, never enforced
    pub title_soft_limit: usize,
    /// Advisory only, never enforced
    pub details_soft_limit: usize,
    /// Capacity the usage percentage is measured against (UTF-16 units)
    pub storage_capacity: usize,
    pub storage_warning_percent: f64,
    /// Minimum gap between two advisories of the same kind
    pub warning_cooldown_ms: i64,
    /// A backup older than this is considered stale
    pub backup_stale_hours: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            title_soft_limit: 80,
            details_soft_limit: 600,
            storage_capacity: 5 * 1024 * 1024,
            storage_warning_percent: 85.0,
            warning_cooldown_ms: 3_600_000,
            backup_stale_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Location a tab opens at when none is given
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://tabnote.local/".to_string()
}
