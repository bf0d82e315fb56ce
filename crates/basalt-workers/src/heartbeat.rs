//! Heartbeat checks (§4.6).
//!
//! One check = one one-shot call to the small model with the chat's
//! checklist folded in, checked against the `HEARTBEAT_OK` sentinel.
//! Scheduling (interval tracking, single-flight, delivery) lives in
//! `registry::WorkerHandle`, which owns the per-chat config map and the
//! outbound channel; this module only knows how to run a single check.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use basalt_agent::pipeline::MessageContext;
use basalt_agent::provider::ProviderError;

/// Literal sentinel: the model returns exactly this when there is nothing
/// worth surfacing. Matched case-insensitively after trimming whitespace.
pub const HEARTBEAT_OK: &str = "HEARTBEAT_OK";

/// Run one heartbeat check and return `Some(message)` unless the model
/// replied with the OK sentinel. `checklist` is the contents of the chat's
/// `HEARTBEAT.md`, or `None` if it doesn't exist yet.
pub async fn run_check<C: MessageContext + 'static>(
    ctx: &Arc<C>,
    chat_id: &str,
    checklist: Option<&str>,
) -> Result<Option<String>, ProviderError> {
    let checklist = checklist
        .filter(|c| !c.trim().is_empty())
        .unwrap_or("No checklist configured yet.");
    let now = Utc::now().format("%Y-%m-%d %H:%M UTC");
    let prompt = format!(
        "This is a periodic heartbeat check, not a user message. Current time: {now}.\n\n\
         Checklist:\n{checklist}\n\n\
         If nothing on the checklist needs attention right now, reply with exactly \
         `{HEARTBEAT_OK}` and nothing else. Otherwise reply with a short message for \
         the user explaining what needs attention."
    );

    let model = ctx.agent().small_model().to_string();
    let response = ctx.agent().chat(&prompt, &model).await?;
    let text = response.content.trim();

    if text.eq_ignore_ascii_case(HEARTBEAT_OK) {
        info!(chat_id, "heartbeat: nothing to report");
        return Ok(None);
    }
    Ok(Some(text.to_string()))
}
