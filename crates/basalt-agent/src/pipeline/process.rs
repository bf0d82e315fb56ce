//! The agent turn pipeline — the single place a chat message becomes an
//! LLM turn, shared by every inbound path (live chat events, cron
//! `AgentTurn` jobs, sub-agent bootstraps).
//!
//! Steps (per the runtime's turn-pipeline contract): load session → append
//! user turn → build the budgeted prompt → streaming LLM call with the
//! tool-use loop → on success, append the assistant turn and trigger
//! compaction if needed; on failure, roll back the user turn so a retry
//! never double-inserts it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use basalt_core::types::budgets;
use basalt_sessions::Role as SessionRole;

use crate::provider::{ChatRequest, Message, ProviderError, Role};
use crate::tools::tool_loop;

use super::compact::compact_session_if_needed;
use super::context::MessageContext;

/// Result of a completed turn.
pub struct ProcessedMessage {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
    /// `true` if the turn used one or more tools — callers suppress
    /// intermediate streaming display for these turns per §4.3 step 6.
    pub used_tools: bool,
}

/// Run a full turn for `chat_id`.
///
/// `channel_name` labels the envelope wrapping the user's message (so the
/// LLM can tell which surface a turn arrived from); `attachment_blocks`
/// carries multimodal content (images) when present, switching the request
/// to raw structured messages instead of plain text.
#[allow(clippy::too_many_arguments)]
pub async fn process_message_non_streaming<C: MessageContext + 'static>(
    ctx: &Arc<C>,
    chat_id: &str,
    channel_name: &str,
    content: &str,
    model_override: Option<&str>,
    cancel: Option<CancellationToken>,
    attachment_blocks: Option<Vec<serde_json::Value>>,
) -> Result<ProcessedMessage, ProviderError> {
    let tools = crate::tools::build::build_tools(Arc::clone(ctx), chat_id, channel_name);
    let tool_defs = crate::tools::build::tool_definitions(&tools);

    // §4.2(b): relevant-memory retrieval from the last up-to-three user
    // messages, degrading silently on timeout or failure.
    let memory_context = retrieve_relevant_memory(ctx.as_ref(), chat_id, content).await;

    let session_model = ctx
        .sessions()
        .model(chat_id)
        .await
        .unwrap_or_default();
    let model = model_override
        .map(str::to_string)
        .unwrap_or_else(|| ctx.agent().model_for(session_model).to_string());

    let now = chrono::Utc::now();
    let turn_count = ctx.sessions().stats(chat_id).await.map(|s| s.message_count).unwrap_or(0);
    let session_info = crate::prompt::SessionInfo {
        session_key: chat_id.to_string(),
        turn_count: turn_count as u32,
        timestamp: now.format("%Y-%m-%d %H:%M UTC").to_string(),
    };
    let prompt_builder = ctx.agent().prompt().await;
    let system_prompt = prompt_builder.build_prompt(memory_context.as_deref(), Some(&session_info));
    let plain = system_prompt.to_plain_text();
    drop(prompt_builder);

    // §4.1: append the user turn to in-memory history and the persistent
    // log, before the LLM call so a retry after a crash still sees it.
    let envelope = format_envelope(channel_name, &now.to_rfc3339(), content);
    let should_compact = ctx
        .sessions()
        .append_message(chat_id, SessionRole::User, &envelope, None)
        .await
        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

    // §4.2(c)(d)(e): pins, summaries, then history — assembled in that order.
    let pins = ctx.sessions().pins(chat_id).await.unwrap_or_default();
    let summaries = ctx.sessions().summaries(chat_id).await.unwrap_or_default();
    let history = ctx.sessions().history(chat_id).await.unwrap_or_default();
    let trimmed = basalt_sessions::trim_to_budget(&history, budgets::MAX_HISTORY, budgets::MIN_RECENT);

    let mut messages: Vec<Message> = Vec::new();
    for pin in &pins {
        messages.push(Message {
            role: Role::User,
            content: format!("[pinned] {}", pin.text),
        });
    }
    for summary in &summaries {
        messages.push(Message {
            role: Role::User,
            content: format!("[prior conversation summary] {}", summary.text),
        });
    }
    for m in &trimmed {
        messages.push(Message {
            role: match m.role {
                SessionRole::Assistant => Role::Assistant,
                SessionRole::ToolResult => Role::User,
                SessionRole::User => Role::User,
            },
            content: m.content.clone(),
        });
    }

    let raw_messages = attachment_blocks.map(|blocks| {
        let mut raw: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
            .collect();
        if let Some(last) = raw.pop() {
            let mut content_parts: Vec<serde_json::Value> = vec![serde_json::json!({
                "type": "text",
                "text": last["content"],
            })];
            content_parts.extend(blocks);
            raw.push(serde_json::json!({ "role": "user", "content": content_parts }));
        }
        raw
    });

    let request = ChatRequest {
        model: model.clone(),
        system: plain,
        system_prompt: Some(system_prompt),
        messages: if raw_messages.is_some() { Vec::new() } else { messages },
        max_tokens: 4096,
        stream: false,
        thinking: None,
        tools: tool_defs,
        raw_messages,
    };

    let loop_result = tool_loop::run_tool_loop(
        ctx.agent().provider(),
        request,
        &tools,
        cancel.as_ref(),
    )
    .await;

    let (response, called_tools) = match loop_result {
        Ok(ok) => ok,
        Err(e) => {
            // §4.3 step 7 / §7: roll back the user turn on failure so a
            // retry does not double-insert it.
            let _ = ctx.sessions().rollback_last(chat_id).await;
            return Err(e);
        }
    };

    for tool_name in &called_tools {
        let _ = ctx.memory().log_tool_call(tool_name);
    }

    info!(
        tokens_in = response.tokens_in,
        tokens_out = response.tokens_out,
        model = %response.model,
        chat_id,
        "pipeline: turn complete"
    );

    ctx.sessions()
        .append_message(chat_id, SessionRole::Assistant, &response.content, None)
        .await
        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

    if should_compact || !called_tools.is_empty() {
        let ctx_clone = Arc::clone(ctx);
        let chat_id = chat_id.to_string();
        tokio::spawn(async move {
            compact_session_if_needed(ctx_clone, chat_id).await;
        });
    }

    Ok(ProcessedMessage {
        content: response.content,
        model: response.model,
        tokens_in: response.tokens_in,
        tokens_out: response.tokens_out,
        stop_reason: response.stop_reason,
        used_tools: !called_tools.is_empty(),
    })
}

/// Build a search string from the last up-to-three user messages and run a
/// hybrid memory search, degrading silently on timeout or failure per §4.2.
async fn retrieve_relevant_memory<C: MessageContext>(
    ctx: &C,
    chat_id: &str,
    latest: &str,
) -> Option<String> {
    let history = ctx.sessions().history(chat_id).await.ok()?;
    let mut recent_user_texts: Vec<String> = history
        .iter()
        .rev()
        .filter(|m| matches!(m.role, SessionRole::User))
        .take(2)
        .map(|m| m.content.clone())
        .collect();
    recent_user_texts.push(latest.to_string());
    let query = recent_user_texts.join(" ");

    // `search` is a local, synchronous SQLite lookup — there is no future to
    // cancel mid-flight, so the timeout is enforced as a deadline check:
    // a slow search's results are discarded rather than awaited past budget.
    let started = std::time::Instant::now();
    let result = ctx.memory().search(&query, 3);
    if started.elapsed().as_millis() as u64 > budgets::SEARCH_TIMEOUT_MS {
        return None;
    }
    let hits = result.ok()?;
    if hits.is_empty() {
        return None;
    }
    let mut out = String::from("\n\n## Relevant memory\n");
    for hit in hits {
        out.push_str(&format!("- ({}) {}\n", hit.entry.date, hit.entry.text));
    }
    Some(out)
}

/// Wrap a message with a timestamp envelope: `[channel YYYY-MM-DD HH:MM UTC] content`.
fn format_envelope(channel: &str, created_at: &str, content: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(created_at) {
        Ok(dt) => {
            let utc = dt.with_timezone(&chrono::Utc);
            format!("[{} {}] {}", channel, utc.format("%Y-%m-%d %H:%M UTC"), content)
        }
        Err(_) => content.to_string(),
    }
}
