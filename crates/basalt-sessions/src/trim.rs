//! History trimming for context assembly.
//!
//! Distinct from compaction: trimming is a pure, local, synchronous
//! operation applied to a prompt candidate right before it is sent to the
//! LLM. It never touches persisted state — compaction is what actually
//! shrinks a session's stored history.

use basalt_core::types::estimate_tokens;

use crate::types::Message;

/// Drop the oldest messages until `tokens(history) <= max_tokens`, without
/// ever breaking a tool_use/tool_result pair and never going below
/// `min_recent` messages.
pub fn trim_to_budget(history: &[Message], max_tokens: u64, min_recent: usize) -> Vec<Message> {
    if history.len() <= min_recent {
        return history.to_vec();
    }

    let mut start = 0;
    loop {
        let remaining = &history[start..];
        let tokens: u64 = remaining.iter().map(|m| estimate_tokens(&m.content)).sum();
        if tokens <= max_tokens || remaining.len() <= min_recent {
            return remaining.to_vec();
        }
        // Never cut mid tool_use/tool_result pair: a linked message at the
        // new boundary must be dropped together with its partner.
        let mut next_start = start + 1;
        if remaining[0].is_tool_linked() {
            let id = remaining[0].tool_use_id.clone();
            while next_start < history.len()
                && history[next_start].tool_use_id == id
                && id.is_some()
            {
                next_start += 1;
            }
        }
        if next_start >= history.len() {
            return history[history.len().saturating_sub(min_recent)..].to_vec();
        }
        start = next_start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn msg(text: &str) -> Message {
        Message::new(Role::User, text)
    }

    #[test]
    fn keeps_min_recent_even_over_budget() {
        let history: Vec<Message> = (0..10).map(|i| msg(&format!("message {i}"))).collect();
        let trimmed = trim_to_budget(&history, 1, 6);
        assert_eq!(trimmed.len(), 6);
    }

    #[test]
    fn never_splits_tool_pair() {
        let mut history = vec![msg("old 1"), msg("old 2")];
        let call = Message::new(Role::Assistant, "tool_use").with_tool_use_id("call_1");
        let result = Message::new(Role::ToolResult, "tool_result").with_tool_use_id("call_1");
        history.push(call);
        history.push(result);
        history.push(msg("recent"));

        let trimmed = trim_to_budget(&history, 1, 1);
        // Either both tool messages are present or neither is.
        let has_call = trimmed.iter().any(|m| m.tool_use_id.as_deref() == Some("call_1"));
        let call_count = trimmed
            .iter()
            .filter(|m| m.tool_use_id.as_deref() == Some("call_1"))
            .count();
        assert!(!has_call || call_count == 2);
    }

    #[test]
    fn under_budget_is_noop() {
        let history = vec![msg("a"), msg("b")];
        let trimmed = trim_to_budget(&history, 10_000, 6);
        assert_eq!(trimmed.len(), 2);
    }
}
