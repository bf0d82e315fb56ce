//! Daily briefing composition (§4.6).
//!
//! One call = one one-shot call to the small model asking for a friendly
//! morning summary. Scheduling (the once-a-minute wall-clock scan across
//! all chats, `last_sent_date` bookkeeping) lives in `registry::WorkerHandle`.

use std::sync::Arc;

use basalt_agent::pipeline::MessageContext;
use basalt_agent::provider::ProviderError;

/// Compose today's briefing text for `city`. Weather/calendar data is
/// folded into the prompt as plain instructions since neither has a
/// dedicated fetch step in this crate; the model is expected to reach for
/// the calendar/weather tools available through the main tool registry if
/// the provider configured here is tool-capable. For the one-shot call used
/// by the ticker, the prompt describes what the message should contain.
pub async fn compose<C: MessageContext + 'static>(
    ctx: &Arc<C>,
    city: &str,
) -> Result<String, ProviderError> {
    let prompt = format!(
        "Compose a short, friendly morning briefing message for the user. \
         Mention today's weather outlook for {city} and a one-line summary of \
         anything on today's calendar, if known. Keep it to a few sentences, \
         warm but not saccharine. If you have no real weather or calendar data \
         available, say so briefly rather than inventing specifics."
    );
    let model = ctx.agent().small_model().to_string();
    let response = ctx.agent().chat(&prompt, &model).await?;
    Ok(response.content.trim().to_string())
}

/// `true` once local wall-clock time (`HH:MM`, compared to the minute) has
/// reached `time_of_day` and no briefing has gone out yet today.
pub fn is_due(time_of_day: &str, last_sent_date: Option<&str>, now: chrono::DateTime<chrono::Utc>) -> bool {
    let today = now.format("%Y-%m-%d").to_string();
    if last_sent_date == Some(today.as_str()) {
        return false;
    }
    let current = now.format("%H:%M").to_string();
    current.as_str() >= time_of_day
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hms: &str) -> chrono::DateTime<chrono::Utc> {
        let full = format!("2026-08-01T{hms}:00Z");
        chrono::Utc.datetime_from_str(&full, "%Y-%m-%dT%H:%M:%SZ").unwrap()
    }

    #[test]
    fn not_due_before_time() {
        assert!(!is_due("08:00", None, at("07:59")));
    }

    #[test]
    fn due_at_or_after_time() {
        assert!(is_due("08:00", None, at("08:00")));
        assert!(is_due("08:00", None, at("09:30")));
    }

    #[test]
    fn not_due_twice_same_day() {
        assert!(!is_due("08:00", Some("2026-08-01"), at("09:00")));
    }

    #[test]
    fn due_again_next_day() {
        assert!(is_due("08:00", Some("2026-07-31"), at("08:05")));
    }
}
