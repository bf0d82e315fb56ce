//! Memory tool family (§4.4 Memory tools) — `save_memory`, `memory_search`,
//! `memory_reindex`, `save_persona`. All four sit directly on top of
//! `basalt_memory::MemoryManager`; there is no separate "knowledge base"
//! concept, just the dated-markdown long-term store and its FTS5/vector
//! hybrid index.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

/// Append a fact to today's dated memory file and its search index.
pub struct SaveMemoryTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> SaveMemoryTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for SaveMemoryTool<C> {
    fn name(&self) -> &str {
        "save_memory"
    }

    fn description(&self) -> &str {
        "Save a fact, preference, or piece of context to long-term memory so it \
         can be retrieved in future conversations. Use this for anything worth \
         remembering beyond the current chat — not for transient chit-chat."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "The fact to remember, written as a standalone sentence." }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let text = match input.get("text").and_then(|v| v.as_str()) {
            Some(t) if !t.trim().is_empty() => t.trim(),
            _ => return ToolResult::error("'text' is required and must not be empty"),
        };
        match self.ctx.memory().save_memory(text) {
            Ok(()) => ToolResult::success("Saved to memory."),
            Err(e) => ToolResult::error(format!("failed to save memory: {e}")),
        }
    }
}

/// Hybrid keyword + vector search over long-term memory.
pub struct MemorySearchTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> MemorySearchTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for MemorySearchTool<C> {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search long-term memory for facts relevant to a query. Use this when \
         the user references something from a past conversation that was not \
         automatically surfaced."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to search for." },
                "limit": { "type": "integer", "description": "Max results (default 5)." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q.trim(),
            _ => return ToolResult::error("'query' is required and must not be empty"),
        };
        let limit = input
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(5);

        match self.ctx.memory().search(query, limit) {
            Ok(hits) if hits.is_empty() => ToolResult::success("No matching memories found."),
            Ok(hits) => {
                let mut out = String::from("Matching memories:\n");
                for hit in hits {
                    out.push_str(&format!("- ({}) {} [score {:.2}]\n", hit.entry.date, hit.entry.text, hit.score));
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("search failed: {e}")),
        }
    }
}

/// Rebuild the FTS5/vector index from the dated markdown files on disk.
pub struct MemoryReindexTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> MemoryReindexTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for MemoryReindexTool<C> {
    fn name(&self) -> &str {
        "memory_reindex"
    }

    fn description(&self) -> &str {
        "Rebuild the memory search index from the markdown files on disk. Use \
         this if memory files were edited outside the bot (e.g. by hand) and \
         search results look stale."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> ToolResult {
        match self.ctx.memory().reindex() {
            Ok(n) => ToolResult::success(format!("Reindexed {n} memory entries.")),
            Err(e) => ToolResult::error(format!("reindex failed: {e}")),
        }
    }
}

/// Rewrite `SOUL.md` and hot-reload the system prompt.
pub struct SavePersonaTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> SavePersonaTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for SavePersonaTool<C> {
    fn name(&self) -> &str {
        "save_persona"
    }

    fn description(&self) -> &str {
        "Rewrite the assistant's persona/tone document (SOUL.md) and reload it \
         immediately. Use only when the operator explicitly asks to change how \
         the assistant presents itself, never on a passing remark."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Full replacement content for SOUL.md." }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => c.to_string(),
            _ => return ToolResult::error("'content' is required and must not be empty"),
        };

        let workspace_dir = {
            let prompt = self.ctx.agent().prompt().await;
            prompt.workspace_dir().map(|p| p.to_path_buf())
        };
        let Some(dir) = workspace_dir else {
            return ToolResult::error(
                "no workspace directory configured — persona is running in legacy single-file mode",
            );
        };

        if let Err(e) = std::fs::create_dir_all(&dir) {
            return ToolResult::error(format!("failed to create workspace dir: {e}"));
        }
        if let Err(e) = std::fs::write(dir.join("SOUL.md"), content) {
            return ToolResult::error(format!("failed to write SOUL.md: {e}"));
        }

        self.ctx.agent().reload_prompt().await;
        ToolResult::success("Persona updated and reloaded.")
    }
}
