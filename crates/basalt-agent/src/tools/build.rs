//! Tool registry — builds the canonical tool list for any channel adapter.

use std::sync::Arc;

use crate::pipeline::context::MessageContext;
use crate::provider::ToolDefinition;

use super::briefing_tools::{ControlBriefingTool, SendBriefingNowTool};
use super::calendar_tools::CalendarTool;
use super::change_model::ChangeModelTool;
use super::cron::CronTool;
use super::heartbeat_tools::{ControlHeartbeatTool, RunHeartbeatCheckTool};
use super::memory_tools::{MemoryReindexTool, MemorySearchTool, SaveMemoryTool, SavePersonaTool};
use super::reminder::ReminderTool;
use super::run_command::{GetSessionLogTool, KillSessionTool, ListSessionsTool, RunCommandTool};
use super::subagent_tools::{CancelAgentTool, ListAgentsTool, SpawnAgentTool};
use super::web::{GetWeatherTool, WebFetchTool, WebSearchTool};
use super::{to_definitions, Tool};

/// Build the full list of tools available to the AI for a given request.
///
/// Covers every §4.4 tool family: filesystem, shell, model control, memory,
/// external (weather/search/fetch), and scheduling (reminders/cron/calendar).
/// The registry is fixed, matching §4.4's "a fixed registry of tools" — no
/// runtime plugin loading.
pub fn build_tools<C: MessageContext + 'static>(
    ctx: Arc<C>,
    chat_id: &str,
    _channel_name: &str,
) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(super::read_file::ReadFileTool),
        Box::new(super::write_file::WriteFileTool),
        Box::new(super::list_files::ListFilesTool),
        Box::new(super::search_files::SearchFilesTool),
        Box::new(ReminderTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(ChangeModelTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(CronTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(CalendarTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(SaveMemoryTool::new(Arc::clone(&ctx))),
        Box::new(MemorySearchTool::new(Arc::clone(&ctx))),
        Box::new(MemoryReindexTool::new(Arc::clone(&ctx))),
        Box::new(SavePersonaTool::new(Arc::clone(&ctx))),
        Box::new(super::patch_file::PatchFileTool),
        Box::new(WebFetchTool),
        Box::new(GetWeatherTool),
        Box::new(WebSearchTool),
        Box::new(RunCommandTool::new(Arc::clone(&ctx))),
        Box::new(ListSessionsTool::new(Arc::clone(&ctx))),
        Box::new(GetSessionLogTool::new(Arc::clone(&ctx))),
        Box::new(KillSessionTool::new(Arc::clone(&ctx))),
        Box::new(ControlHeartbeatTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(RunHeartbeatCheckTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(ControlBriefingTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(SendBriefingNowTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(SpawnAgentTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(ListAgentsTool::new(Arc::clone(&ctx), chat_id)),
        Box::new(CancelAgentTool::new(Arc::clone(&ctx))),
    ]
}

/// Convert a tool list to API-level definitions for the LLM request.
pub fn tool_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    to_definitions(tools)
}
