//! Scheduling tool family (§4.4) — calendar. Backed by
//! `basalt_core::calendar::CalendarStore`, one JSON file per chat under the
//! workspace root, the same atomic-write idiom `save_persona` uses for
//! `SOUL.md`.

use std::sync::Arc;

use async_trait::async_trait;
use basalt_core::calendar::{CalendarEvent, CalendarStore};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

pub struct CalendarTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> CalendarTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }

    async fn store(&self) -> Option<CalendarStore> {
        let prompt = self.ctx.agent().prompt().await;
        prompt.workspace_dir().map(CalendarStore::new)
    }

    async fn list(&self) -> ToolResult {
        let Some(store) = self.store().await else {
            return ToolResult::error("no workspace directory configured for calendar storage");
        };
        match store.list(&self.chat_id) {
            Ok(events) if events.is_empty() => ToolResult::success("No calendar events."),
            Ok(events) => {
                let lines: Vec<String> = events
                    .iter()
                    .map(|e| {
                        format!(
                            "{} — {} ({}{}){}",
                            e.id,
                            e.title,
                            e.starts_at,
                            e.ends_at.as_deref().map(|end| format!(" to {end}")).unwrap_or_default(),
                            e.location.as_deref().map(|l| format!(" @ {l}")).unwrap_or_default(),
                        )
                    })
                    .collect();
                ToolResult::success(lines.join("\n"))
            }
            Err(e) => ToolResult::error(format!("failed to list calendar events: {e}")),
        }
    }

    async fn add(&self, input: &Value) -> ToolResult {
        let title = match input.get("title").and_then(|v| v.as_str()) {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => return ToolResult::error("'title' is required"),
        };
        let starts_at = match input.get("starts_at").and_then(|v| v.as_str()) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return ToolResult::error("'starts_at' is required (ISO-8601 UTC)"),
        };
        let Some(store) = self.store().await else {
            return ToolResult::error("no workspace directory configured for calendar storage");
        };

        let event = CalendarEvent {
            id: Uuid::new_v4().to_string(),
            title,
            starts_at,
            ends_at: input.get("ends_at").and_then(|v| v.as_str()).map(String::from),
            location: input.get("location").and_then(|v| v.as_str()).map(String::from),
            description: input.get("description").and_then(|v| v.as_str()).map(String::from),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let id = event.id.clone();

        match store.add(&self.chat_id, event) {
            Ok(()) => ToolResult::success(format!("Event added (id: {id})")),
            Err(e) => ToolResult::error(format!("failed to add calendar event: {e}")),
        }
    }

    async fn delete(&self, input: &Value) -> ToolResult {
        let id = match input.get("event_id").and_then(|v| v.as_str()) {
            Some(id) => id,
            None => return ToolResult::error("'event_id' is required"),
        };
        let Some(store) = self.store().await else {
            return ToolResult::error("no workspace directory configured for calendar storage");
        };
        match store.delete(&self.chat_id, id) {
            Ok(true) => ToolResult::success(format!("Event {id} deleted")),
            Ok(false) => ToolResult::error(format!("no event found with id {id}")),
            Err(e) => ToolResult::error(format!("failed to delete calendar event: {e}")),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for CalendarTool<C> {
    fn name(&self) -> &str {
        "manage_calendar"
    }

    fn description(&self) -> &str {
        "List, add, or delete calendar events. action=list takes no arguments. \
         action=add requires title and starts_at (ISO-8601 UTC), with optional \
         ends_at, location, description. action=delete requires event_id."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["list", "add", "delete"] },
                "title": { "type": "string" },
                "starts_at": { "type": "string", "description": "ISO-8601 UTC timestamp." },
                "ends_at": { "type": "string", "description": "ISO-8601 UTC timestamp." },
                "location": { "type": "string" },
                "description": { "type": "string" },
                "event_id": { "type": "string" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        match input.get("action").and_then(|v| v.as_str()) {
            Some("list") => self.list().await,
            Some("add") => self.add(&input).await,
            Some("delete") => self.delete(&input).await,
            _ => ToolResult::error("'action' must be one of: list, add, delete"),
        }
    }
}
