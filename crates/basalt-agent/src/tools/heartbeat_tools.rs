//! Heartbeat tool family (§4.6) — `control_heartbeat`, `run_heartbeat_check`.
//! Both sit on top of `MessageContext::workers()`, the seam that reaches the
//! `basalt-workers` crate without this one depending on it directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

/// Turn a chat's heartbeat on/off, change its interval, or read its status.
pub struct ControlHeartbeatTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> ControlHeartbeatTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for ControlHeartbeatTool<C> {
    fn name(&self) -> &str {
        "control_heartbeat"
    }

    fn description(&self) -> &str {
        "Enable, disable, or check the status of this chat's periodic \
         heartbeat — a background check that periodically reviews a checklist \
         and proactively messages the user only if something needs attention."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["on", "off", "status"],
                    "description": "'on' enables (optionally with a new interval_ms), 'off' disables, 'status' reports current state."
                },
                "interval_ms": {
                    "type": "integer",
                    "description": "Milliseconds between checks. Only used with action 'on'; defaults to the existing or 1-hour interval."
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
                let status = self.ctx.workers().heartbeat_status(&self.chat_id);
                ToolResult::success(format!(
                    "Heartbeat is {} (interval: {}ms).",
                    if status.enabled { "on" } else { "off" },
                    status.interval_ms,
                ))
            }
            "on" => {
                let interval_ms = input.get("interval_ms").and_then(|v| v.as_u64());
                match self.ctx.workers().set_heartbeat(&self.chat_id, true, interval_ms) {
                    Ok(status) => ToolResult::success(format!(
                        "Heartbeat enabled (interval: {}ms).",
                        status.interval_ms
                    )),
                    Err(e) => ToolResult::error(format!("failed to enable heartbeat: {e}")),
                }
            }
            "off" => match self.ctx.workers().set_heartbeat(&self.chat_id, false, None) {
                Ok(_) => ToolResult::success("Heartbeat disabled."),
                Err(e) => ToolResult::error(format!("failed to disable heartbeat: {e}")),
            },
            other => ToolResult::error(format!(
                "unknown action '{other}': must be 'on', 'off', or 'status'"
            )),
        }
    }
}

/// Force one heartbeat check to run right now, outside its normal schedule.
pub struct RunHeartbeatCheckTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> RunHeartbeatCheckTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for RunHeartbeatCheckTool<C> {
    fn name(&self) -> &str {
        "run_heartbeat_check"
    }

    fn description(&self) -> &str {
        "Run a heartbeat check immediately, regardless of the configured \
         interval or whether the heartbeat is currently enabled. Useful when \
         the user asks 'did anything come up?' right now."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> ToolResult {
        match self.ctx.workers().run_heartbeat_check(&self.chat_id).await {
            Ok(Some(message)) => ToolResult::success(message),
            Ok(None) => ToolResult::success("Nothing needs attention right now."),
            Err(e) => ToolResult::error(format!("heartbeat check failed: {e}")),
        }
    }
}
