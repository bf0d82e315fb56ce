//! Persisted worker configuration, per §4.6.
//!
//! Heartbeat timing telemetry (`last_check_at`/`last_message_at`) is
//! deliberately NOT part of this struct — it stays in-memory only
//! (`registry::WorkerHandle`'s tick-tracking maps), per the spec's explicit
//! choice to avoid write amplification on a per-check basis.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatConfig {
    pub chat_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    3_600_000 // 1 hour
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            chat_id: String::new(),
            enabled: false,
            interval_ms: default_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BriefingConfig {
    pub chat_id: String,
    #[serde(default)]
    pub enabled: bool,
    /// `HH:MM`, 24-hour, compared against UTC wall-clock time.
    #[serde(default = "default_time_of_day")]
    pub time_of_day: String,
    #[serde(default)]
    pub city: String,
    /// `YYYY-MM-DD` of the last date a briefing was sent; `None` if never.
    #[serde(default)]
    pub last_sent_date: Option<String>,
}

fn default_time_of_day() -> String {
    "08:00".to_string()
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self {
            chat_id: String::new(),
            enabled: false,
            time_of_day: default_time_of_day(),
            city: String::new(),
            last_sent_date: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct HeartbeatList {
    pub(crate) items: Vec<HeartbeatConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct BriefingList {
    pub(crate) items: Vec<BriefingConfig>,
}
