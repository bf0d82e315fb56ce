//! Calendar event record and file-backed store, used by `basalt-agent`'s
//! `get_calendar_events`/`add_calendar_event`/`delete_calendar_event` tools.
//!
//! Canonical state is a single JSON file per chat under the workspace root
//! (`calendar/<chat_id>.json`), written atomically via [`crate::fs`] — the
//! same persistence idiom `basalt-sessions` uses for session state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs::{read_json_or_default, write_json_atomic};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    /// ISO-8601 UTC start time.
    pub starts_at: String,
    /// ISO-8601 UTC end time, if known.
    pub ends_at: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EventList {
    events: Vec<CalendarEvent>,
}

pub struct CalendarStore {
    workspace_root: PathBuf,
}

impl CalendarStore {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    fn file_for(&self, chat_id: &str) -> PathBuf {
        self.workspace_root.join("calendar").join(format!("{chat_id}.json"))
    }

    pub fn list(&self, chat_id: &str) -> Result<Vec<CalendarEvent>> {
        let list: EventList = read_json_or_default(&self.file_for(chat_id))?;
        let mut events = list.events;
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        Ok(events)
    }

    pub fn add(&self, chat_id: &str, event: CalendarEvent) -> Result<()> {
        let path = self.file_for(chat_id);
        let mut list: EventList = read_json_or_default(&path)?;
        list.events.push(event);
        write_json_atomic(&path, &list)
    }

    /// Returns `true` if an event with `event_id` was found and removed.
    pub fn delete(&self, chat_id: &str, event_id: &str) -> Result<bool> {
        let path = self.file_for(chat_id);
        let mut list: EventList = read_json_or_default(&path)?;
        let before = list.events.len();
        list.events.retain(|e| e.id != event_id);
        let removed = list.events.len() != before;
        if removed {
            write_json_atomic(&path, &list)?;
        }
        Ok(removed)
    }
}

pub fn default_store(workspace_root: &Path) -> CalendarStore {
    CalendarStore::new(workspace_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn event(id: &str, starts_at: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: "Standup".to_string(),
            starts_at: starts_at.to_string(),
            ends_at: None,
            location: None,
            description: None,
            created_at: "2026-08-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn add_then_list_is_sorted_by_start_time() {
        let dir = tempdir().unwrap();
        let store = CalendarStore::new(dir.path());
        store.add("chat-1", event("b", "2026-08-02T09:00:00Z")).unwrap();
        store.add("chat-1", event("a", "2026-08-01T09:00:00Z")).unwrap();

        let events = store.list("chat-1").unwrap();
        assert_eq!(events.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn list_missing_chat_is_empty() {
        let dir = tempdir().unwrap();
        let store = CalendarStore::new(dir.path());
        assert!(store.list("nope").unwrap().is_empty());
    }

    #[test]
    fn delete_removes_only_matching_event() {
        let dir = tempdir().unwrap();
        let store = CalendarStore::new(dir.path());
        store.add("chat-1", event("a", "2026-08-01T09:00:00Z")).unwrap();
        store.add("chat-1", event("b", "2026-08-02T09:00:00Z")).unwrap();

        assert!(store.delete("chat-1", "a").unwrap());
        assert!(!store.delete("chat-1", "a").unwrap());
        let remaining = store.list("chat-1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "b");
    }

    #[test]
    fn events_are_isolated_per_chat() {
        let dir = tempdir().unwrap();
        let store = CalendarStore::new(dir.path());
        store.add("chat-1", event("a", "2026-08-01T09:00:00Z")).unwrap();
        assert!(store.list("chat-2").unwrap().is_empty());
    }
}
