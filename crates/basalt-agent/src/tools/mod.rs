//! Tool system for AI agent tool calling.
//!
//! Defines the `Tool` trait that all tools implement, plus a registry
//! for managing available tools and converting them to LLM API format.

pub mod briefing_tools;
pub mod build;
pub mod calendar_tools;
pub mod change_model;
pub mod cron;
pub mod heartbeat_tools;
pub mod list_files;
pub mod memory_tools;
pub mod patch_file;
pub mod read_file;
pub mod reminder;
pub mod run_command;
pub mod search_files;
pub mod subagent_tools;
pub mod tool_loop;
pub mod web;
pub mod write_file;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::provider::ToolDefinition;

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text content returned to the LLM.
    pub content: String,
    /// Whether the tool execution failed.
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name for this tool (e.g. "read_file").
    fn name(&self) -> &str;
    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;
    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;
    /// Execute the tool with the given input.
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

/// Static catalog of all built-in tools (name, description).
///
/// Does not require instantiation or context — useful for `/tools` listing.
pub fn tool_catalog() -> Vec<(&'static str, &'static str)> {
    vec![
        ("read_file", "Read the contents of a file"),
        ("write_file", "Write content to a file"),
        ("list_directory", "List files in a directory"),
        ("search_files", "Search for text patterns in files"),
        ("edit_file", "Replace an exact string inside a file"),
        ("change_model", "Switch the model size used for this conversation"),
        ("run_command", "Run a shell command in the foreground or background"),
        ("list_sessions", "List background command sessions"),
        ("get_session_log", "Get output and status for a background session"),
        ("kill_session", "Stop a running background session"),
        ("save_memory", "Save a fact to long-term memory"),
        ("memory_search", "Search long-term memory"),
        ("memory_reindex", "Rebuild the memory search index from disk"),
        ("save_persona", "Rewrite and reload the assistant's persona document"),
        ("reminder", "Set, list, or cancel a timed reminder"),
        ("manage_cron", "Add, list, remove, pause, resume, or trigger a recurring cron job"),
        ("manage_calendar", "List, add, or delete calendar events"),
        ("web_fetch", "Fetch a web page and extract its text content"),
        ("get_weather", "Get current weather conditions for a location"),
        ("web_search", "Search the web for a query"),
        ("control_heartbeat", "Enable, disable, or check this chat's periodic heartbeat"),
        ("run_heartbeat_check", "Run a heartbeat check immediately"),
        ("control_briefing", "Enable, disable, or check this chat's daily briefing"),
        ("send_briefing_now", "Compose and send the daily briefing immediately"),
        ("spawn_agent", "Delegate a task to an independent background sub-agent"),
        ("list_agents", "List sub-agents spawned from this chat"),
        ("cancel_agent", "Cancel a running sub-agent by ID"),
    ]
}

/// Convert a slice of tools to API-level tool definitions.
pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}
