//! Briefing tool family (§4.6) — `control_briefing`, `send_briefing_now`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

/// Turn a chat's daily briefing on/off, change its time or city, or read status.
pub struct ControlBriefingTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> ControlBriefingTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for ControlBriefingTool<C> {
    fn name(&self) -> &str {
        "control_briefing"
    }

    fn description(&self) -> &str {
        "Enable, disable, or check the status of this chat's daily briefing — \
         a once-a-day message summarizing weather and the day's calendar, \
         sent automatically at a configured local time."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["on", "off", "status"],
                    "description": "'on' enables (optionally with time_of_day/city), 'off' disables, 'status' reports current state."
                },
                "time_of_day": {
                    "type": "string",
                    "description": "24-hour HH:MM local time to send the briefing. Only used with action 'on'."
                },
                "city": {
                    "type": "string",
                    "description": "City to use for the weather portion of the briefing. Only used with action 'on'."
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let action = match input.get("action").and_then(|v| v.as_str()) {
            Some(a) => a,
            None => return ToolResult::error("missing required field 'action'"),
        };

        match action {
            "status" => {
                let status = self.ctx.workers().briefing_status(&self.chat_id);
                ToolResult::success(format!(
                    "Briefing is {} at {} for {} (last sent: {}).",
                    if status.enabled { "on" } else { "off" },
                    status.time_of_day,
                    if status.city.is_empty() { "an unset city" } else { &status.city },
                    status.last_sent_date.as_deref().unwrap_or("never"),
                ))
            }
            "on" => {
                let time_of_day = input.get("time_of_day").and_then(|v| v.as_str()).map(String::from);
                let city = input.get("city").and_then(|v| v.as_str()).map(String::from);
                match self.ctx.workers().set_briefing(&self.chat_id, true, time_of_day, city) {
                    Ok(status) => ToolResult::success(format!(
                        "Briefing enabled for {} at {}.",
                        status.city, status.time_of_day
                    )),
                    Err(e) => ToolResult::error(format!("failed to enable briefing: {e}")),
                }
            }
            "off" => match self.ctx.workers().set_briefing(&self.chat_id, false, None, None) {
                Ok(_) => ToolResult::success("Briefing disabled."),
                Err(e) => ToolResult::error(format!("failed to disable briefing: {e}")),
            },
            other => ToolResult::error(format!(
                "unknown action '{other}': must be 'on', 'off', or 'status'"
            )),
        }
    }
}

/// Compose and send today's briefing right now, outside its normal schedule.
pub struct SendBriefingNowTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> SendBriefingNowTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for SendBriefingNowTool<C> {
    fn name(&self) -> &str {
        "send_briefing_now"
    }

    fn description(&self) -> &str {
        "Compose and send the daily briefing immediately, regardless of the \
         configured time of day. Use this when the user asks for their \
         briefing right now."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> ToolResult {
        match self.ctx.workers().send_briefing_now(&self.chat_id).await {
            Ok(message) => ToolResult::success(message),
            Err(e) => ToolResult::error(format!("failed to send briefing: {e}")),
        }
    }
}
