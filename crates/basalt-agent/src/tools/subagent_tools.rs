//! Sub-agent tool family (§4.6) — `spawn_agent`, `list_agents`, `cancel_agent`.
//! The sub-agent itself runs in `basalt-workers`; these tools only start,
//! list, and cancel it through `MessageContext::workers()`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

/// Delegate a task to an independent sub-agent that runs in the background
/// and posts its result back to this chat on completion.
pub struct SpawnAgentTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> SpawnAgentTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for SpawnAgentTool<C> {
    fn name(&self) -> &str {
        "spawn_agent"
    }

    fn description(&self) -> &str {
        "Delegate a self-contained task to an independent sub-agent that runs \
         in the background with its own tool access and reports its result \
         back to this chat when done. Use this for tasks that would take a \
         while or that shouldn't block the current conversation — not for \
         anything that needs a quick answer now."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "A clear, self-contained description of the task to delegate." }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let task = match input.get("task").and_then(|v| v.as_str()) {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => return ToolResult::error("'task' is required and must not be empty"),
        };
        match self.ctx.workers().spawn_agent(&self.chat_id, task).await {
            Ok(id) => ToolResult::success(format!("Sub-agent started. ID: {id}")),
            Err(e) => ToolResult::error(format!("failed to spawn sub-agent: {e}")),
        }
    }
}

/// List sub-agents spawned from this chat, running or finished.
pub struct ListAgentsTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> ListAgentsTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for ListAgentsTool<C> {
    fn name(&self) -> &str {
        "list_agents"
    }

    fn description(&self) -> &str {
        "List sub-agents spawned from this chat, including whether each is \
         still running and its result if finished."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> ToolResult {
        let agents = self.ctx.workers().list_agents(&self.chat_id);
        if agents.is_empty() {
            return ToolResult::success("No sub-agents for this chat.");
        }
        let mut out = format!("Sub-agents ({}):\n", agents.len());
        for a in agents {
            out.push_str(&format!(
                "- ID: {} | Task: {} | Started: {} | Status: {}\n",
                a.id,
                a.task,
                a.started_at,
                if a.running {
                    "running".to_string()
                } else {
                    format!("done: {}", a.result.as_deref().unwrap_or("(no result)"))
                },
            ));
        }
        ToolResult::success(out)
    }
}

/// Cancel a running sub-agent by id.
pub struct CancelAgentTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> CancelAgentTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for CancelAgentTool<C> {
    fn name(&self) -> &str {
        "cancel_agent"
    }

    fn description(&self) -> &str {
        "Cancel a running sub-agent by its ID, as returned by spawn_agent or \
         list_agents."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_id": { "type": "string", "description": "The sub-agent ID to cancel." }
            },
            "required": ["agent_id"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let agent_id = match input.get("agent_id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => id,
            _ => return ToolResult::error("'agent_id' is required"),
        };
        match self.ctx.workers().cancel_agent(agent_id) {
            Ok(()) => ToolResult::success(format!("Sub-agent '{agent_id}' canceled.")),
            Err(e) => ToolResult::error(format!("failed to cancel sub-agent: {e}")),
        }
    }
}
