//! Whole-file JSON persistence for heartbeat/briefing configs, following the
//! same atomic-write idiom `basalt_core::calendar::CalendarStore` uses for
//! per-chat state — here there is one file for all chats since the lists
//! stay small (one entry per chat that has ever enabled the feature).

use std::path::{Path, PathBuf};

use basalt_core::fs::{read_json_or_default, write_json_atomic};
use basalt_core::Result;

use crate::types::{BriefingConfig, BriefingList, HeartbeatConfig, HeartbeatList};

pub struct WorkerStore {
    workspace_root: PathBuf,
}

impl WorkerStore {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    fn heartbeat_path(&self) -> PathBuf {
        self.workspace_root.join("heartbeat.json")
    }

    fn briefing_path(&self) -> PathBuf {
        self.workspace_root.join("briefing.json")
    }

    pub fn load_heartbeats(&self) -> Result<Vec<HeartbeatConfig>> {
        let list: HeartbeatList = read_json_or_default(&self.heartbeat_path())?;
        Ok(list.items)
    }

    pub fn save_heartbeats(&self, items: Vec<HeartbeatConfig>) -> Result<()> {
        write_json_atomic(&self.heartbeat_path(), &HeartbeatList { items })
    }

    pub fn load_briefings(&self) -> Result<Vec<BriefingConfig>> {
        let list: BriefingList = read_json_or_default(&self.briefing_path())?;
        Ok(list.items)
    }

    pub fn save_briefings(&self, items: Vec<BriefingConfig>) -> Result<()> {
        write_json_atomic(&self.briefing_path(), &BriefingList { items })
    }
}

pub fn default_store(workspace_root: &Path) -> WorkerStore {
    WorkerStore::new(workspace_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn heartbeats_roundtrip() {
        let dir = tempdir().unwrap();
        let store = WorkerStore::new(dir.path());
        assert!(store.load_heartbeats().unwrap().is_empty());

        let cfg = HeartbeatConfig {
            chat_id: "chat-1".to_string(),
            enabled: true,
            interval_ms: 60_000,
        };
        store.save_heartbeats(vec![cfg.clone()]).unwrap();
        assert_eq!(store.load_heartbeats().unwrap(), vec![cfg]);
    }

    #[test]
    fn briefings_roundtrip() {
        let dir = tempdir().unwrap();
        let store = WorkerStore::new(dir.path());
        let cfg = BriefingConfig {
            chat_id: "chat-1".to_string(),
            enabled: true,
            time_of_day: "09:00".to_string(),
            city: "Seoul".to_string(),
            last_sent_date: Some("2026-08-01".to_string()),
        };
        store.save_briefings(vec![cfg.clone()]).unwrap();
        assert_eq!(store.load_briefings().unwrap(), vec![cfg]);
    }
}
