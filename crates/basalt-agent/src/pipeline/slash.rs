//! Slash command interception — handled before a message ever reaches the
//! agent turn pipeline.

use basalt_sessions::{ModelVariant, PinSource};
use tracing::info;

use crate::pipeline::MessageContext;

/// Resolve a model alias ("opus", "haiku", "small"...) to a `ModelVariant`.
fn resolve_model_alias(input: &str) -> Option<ModelVariant> {
    match input.to_lowercase().as_str() {
        "small" | "haiku" => Some(ModelVariant::Small),
        "balanced" | "sonnet" => Some(ModelVariant::Balanced),
        "large" | "opus" => Some(ModelVariant::Large),
        _ => None,
    }
}

/// Handle a slash command for `chat_id`.
///
/// Returns `Some(reply)` if `message` was a recognized command — it must
/// not reach the agent pipeline — or `None` to forward it as an ordinary
/// user turn.
pub async fn handle_slash_command<C: MessageContext>(
    chat_id: &str,
    message: &str,
    ctx: &C,
) -> Option<String> {
    let trimmed = message.trim();

    if trimmed.eq_ignore_ascii_case("/help") {
        return Some(
            "**Basalt commands**\n\
             - `/help` — show this help\n\
             - `/model` — show current model\n\
             - `/model <small|balanced|large>` — switch model for this chat\n\
             - `/tools` — list available tools\n\
             - `/clear` — clear conversation history (pins are kept)\n\
             - `/compact` — condense older history into a summary now"
                .to_string(),
        );
    }

    if trimmed.eq_ignore_ascii_case("/model") {
        let model = ctx.sessions().model(chat_id).await.unwrap_or_default();
        return Some(format!(
            "Current model: **{model}**\n\nAvailable: `/model small` | `/model balanced` | `/model large`"
        ));
    }

    if let Some(arg) = trimmed.strip_prefix("/model ") {
        let arg = arg.trim();
        return match resolve_model_alias(arg) {
            Some(variant) => {
                if ctx.sessions().set_model(chat_id, variant).await.is_err() {
                    return Some("Failed to switch model — please try again.".to_string());
                }
                info!(chat_id, model = %variant, "model switched via /model command");
                Some(format!("Model switched to **{variant}**."))
            }
            None => Some(format!(
                "Unknown model: `{arg}`. Available: `small`, `balanced`, `large`"
            )),
        };
    }

    if trimmed.eq_ignore_ascii_case("/tools") {
        return Some(build_tools_listing());
    }

    if trimmed.eq_ignore_ascii_case("/clear") {
        return match ctx.sessions().clear_history(chat_id).await {
            Ok(()) => Some("Conversation history cleared. Pinned context was kept.".to_string()),
            Err(e) => Some(format!("Failed to clear history: {e}")),
        };
    }

    if trimmed.eq_ignore_ascii_case("/compact") {
        return match super::compact::compact_now(ctx, chat_id).await {
            Ok(true) => Some("History compacted.".to_string()),
            Ok(false) => Some("Nothing to compact — history is already within budget.".to_string()),
            Err(e) => Some(format!("Compaction failed: {e}")),
        };
    }

    if let Some(text) = trimmed.strip_prefix("/pin ") {
        return match ctx.sessions().pin(chat_id, text.trim(), PinSource::User).await {
            Ok(true) => Some("Pinned.".to_string()),
            Ok(false) => Some("Could not pin — pinned context is already at its budget.".to_string()),
            Err(e) => Some(format!("Failed to pin: {e}")),
        };
    }

    None
}

/// Build the `/tools` listing from the fixed built-in registry (§4.4).
fn build_tools_listing() -> String {
    let mut out = String::from("**Basalt tools**\n\n");
    for (name, desc) in crate::tools::tool_catalog() {
        out.push_str(&format!("- `{name}` — {desc}\n"));
    }
    out
}
