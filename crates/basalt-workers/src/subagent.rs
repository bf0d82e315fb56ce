//! Sub-agent runner — an independent, short-lived conversation with its own
//! `[{user: task}]` history and a narrow system prompt, sharing the main
//! LLM provider and the same fixed tool registry (§4.6).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use basalt_agent::pipeline::MessageContext;
use basalt_agent::provider::{ChatRequest, Message, ProviderError, Role};
use basalt_agent::tools::build::{build_tools, tool_definitions};
use basalt_agent::tools::tool_loop::run_tool_loop;

/// Kept bounded and deliberately narrow, per §9's guidance: a sub-agent must
/// not wander into destructive actions or imitate the main persona.
const SUBAGENT_SYSTEM_PROMPT: &str =
    "You are a sub-agent working on a single delegated task. Use the \
     available tools as needed, then return a concise result. Do not \
     perform destructive actions (deleting files, killing sessions, \
     canceling other jobs) unless the task explicitly asks for it.";

/// Run one sub-agent turn to completion and return its final text.
pub async fn run<C: MessageContext + 'static>(
    ctx: Arc<C>,
    chat_id: &str,
    task: &str,
    cancel: &CancellationToken,
) -> Result<String, ProviderError> {
    let tools = build_tools(Arc::clone(&ctx), chat_id, "subagent");
    let tool_defs = tool_definitions(&tools);
    let model = ctx.agent().balanced_model().to_string();

    let request = ChatRequest {
        model,
        system: SUBAGENT_SYSTEM_PROMPT.to_string(),
        system_prompt: None,
        messages: vec![Message {
            role: Role::User,
            content: task.to_string(),
        }],
        max_tokens: 4096,
        stream: false,
        thinking: None,
        tools: tool_defs,
        raw_messages: None,
    };

    let (response, _called_tools) =
        run_tool_loop(ctx.agent().provider(), request, &tools, Some(cancel)).await?;

    Ok(response.content)
}
