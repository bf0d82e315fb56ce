//! Compaction — condense old history into an LLM-generated summary so a
//! session stays under its token budget.
//!
//! Triggered automatically (fire-and-forget, after an append that pushes
//! history over the soft ceiling) or explicitly via `/compact`. Both paths
//! go through `compact_now`, which is a no-op when history is already
//! within budget.

use std::sync::Arc;

use tracing::{info, warn};

use basalt_core::types::{budgets, estimate_tokens};
use basalt_sessions::{Message, Role, Summary};

use crate::provider::{ChatRequest, Message as LlmMessage, Role as LlmRole};

use super::context::MessageContext;

const COMPACTION_TRIGGER_TOKENS: u64 =
    (budgets::MAX_CONTEXT as f64 * budgets::COMPACTION_THRESHOLD_PCT) as u64;

/// Fire-and-forget entry point, called after an append that pushed history
/// over `MAX_HISTORY`. Logs and returns on any failure — the turn that
/// triggered this has already completed and must not be retried because of
/// a compaction error.
pub async fn compact_session_if_needed<C: MessageContext + 'static>(ctx: Arc<C>, chat_id: String) {
    match compact_now(ctx.as_ref(), &chat_id).await {
        Ok(true) => info!(chat_id = %chat_id, "compaction completed"),
        Ok(false) => {}
        Err(e) => warn!(chat_id = %chat_id, error = %e, "compaction failed, history left unchanged"),
    }
}

/// Run compaction for `chat_id` if its history is over
/// `COMPACTION_TRIGGER_TOKENS`. Returns `Ok(true)` if a compaction actually
/// ran, `Ok(false)` if it was a no-op (already within budget — idempotent),
/// `Err` if the condensation call failed, in which case history is left
/// untouched (§4.2 failure semantics: never silently drop messages).
pub async fn compact_now<C: MessageContext>(ctx: &C, chat_id: &str) -> Result<bool, String> {
    let history = ctx
        .sessions()
        .history(chat_id)
        .await
        .map_err(|e| e.to_string())?;

    let total_tokens: u64 = history.iter().map(|m| estimate_tokens(&m.content)).sum();
    if total_tokens <= COMPACTION_TRIGGER_TOKENS || history.len() <= budgets::KEEP_ON_COMPACT {
        return Ok(false);
    }

    let split_at = split_preserving_tool_pairs(&history, budgets::KEEP_ON_COMPACT);
    let (old, recent) = history.split_at(split_at);
    if old.is_empty() {
        return Ok(false);
    }

    let transcript: String = old
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    let condensation_prompt = format!(
        "Summarise the conversation below in 3-5 sentences. Cover decisions made, \
         facts established, stated preferences, and any context that must carry \
         forward into the rest of the conversation. Do not include a preamble, \
         just the summary.\n\n{transcript}"
    );

    let req = ChatRequest {
        model: ctx.agent().small_model().to_string(),
        system: "You condense conversation history for a personal-assistant bot.".to_string(),
        system_prompt: None,
        messages: vec![LlmMessage {
            role: LlmRole::User,
            content: condensation_prompt,
        }],
        max_tokens: 400,
        stream: false,
        thinking: None,
        tools: Vec::new(),
        raw_messages: None,
    };

    let response = ctx
        .agent()
        .provider()
        .send(&req)
        .await
        .map_err(|e| e.to_string())?;

    let summary_text = response.content.trim();
    if summary_text.is_empty() {
        return Err("condensation returned empty summary".to_string());
    }

    let start_id = 0u64;
    let end_id = old.len() as u64;
    let summary = Summary {
        text: summary_text.to_string(),
        covers_range: (start_id, end_id),
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    let mut new_history = Vec::with_capacity(recent.len() + 1);
    new_history.push(Message::new(
        Role::User,
        format!("[prior conversation summary] {summary_text}"),
    ));
    new_history.extend_from_slice(recent);

    ctx.sessions()
        .apply_compaction(chat_id, new_history, summary)
        .await
        .map_err(|e| e.to_string())?;

    Ok(true)
}

/// Find the split point between "old" and "recent" history such that at
/// least `keep_recent` messages are kept, and no tool_use/tool_result pair
/// straddles the boundary.
fn split_preserving_tool_pairs(history: &[Message], keep_recent: usize) -> usize {
    let mut split_at = history.len().saturating_sub(keep_recent);
    while split_at > 0 && split_at < history.len() {
        let boundary_is_linked = history[split_at].is_tool_linked()
            && history[split_at - 1].tool_use_id == history[split_at].tool_use_id;
        if !boundary_is_linked {
            break;
        }
        split_at -= 1;
    }
    split_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_sessions::Message as M;

    #[test]
    fn split_point_never_separates_tool_pair() {
        let mut history = Vec::new();
        for i in 0..10 {
            history.push(M::new(Role::User, format!("turn {i}")));
        }
        let call = M::new(Role::Assistant, "call").with_tool_use_id("x");
        let result = M::new(Role::ToolResult, "result").with_tool_use_id("x");
        history.push(call);
        history.push(result);

        let split = split_preserving_tool_pairs(&history, 1);
        // The split must land before the tool_use message, not between the pair.
        assert!(split <= history.len() - 2);
    }
}
