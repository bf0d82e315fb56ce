//! Per-chat sliding-window rate limiter, applied at ingress alongside the
//! allow-list so a single noisy chat cannot starve the pipeline.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::types::{budgets, ChatId};

/// Tracks recent message timestamps per chat and rejects once the window
/// fills up. `max_messages` / `window_secs` default to
/// `budgets::RATE_LIMIT_MESSAGES` / `budgets::RATE_LIMIT_WINDOW_SECS`.
pub struct RateLimiter {
    max_messages: u32,
    window_secs: u64,
    hits: DashMap<ChatId, VecDeque<DateTime<Utc>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(budgets::RATE_LIMIT_MESSAGES, budgets::RATE_LIMIT_WINDOW_SECS)
    }
}

impl RateLimiter {
    pub fn new(max_messages: u32, window_secs: u64) -> Self {
        Self {
            max_messages,
            window_secs,
            hits: DashMap::new(),
        }
    }

    /// Record one message for `chat_id` at `now` and return `true` if it is
    /// within the allowed rate, `false` if it should be dropped.
    pub fn check(&self, chat_id: &ChatId, now: DateTime<Utc>) -> bool {
        let cutoff = now - chrono::Duration::seconds(self.window_secs as i64);
        let mut entry = self.hits.entry(chat_id.clone()).or_default();

        while matches!(entry.front(), Some(ts) if *ts < cutoff) {
            entry.pop_front();
        }

        if entry.len() as u32 >= self.max_messages {
            return false;
        }

        entry.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn chat(id: &str) -> ChatId {
        ChatId::from(id)
    }

    #[test]
    fn allows_up_to_the_limit() {
        let rl = RateLimiter::new(3, 60);
        let now = Utc::now();
        assert!(rl.check(&chat("1"), now));
        assert!(rl.check(&chat("1"), now));
        assert!(rl.check(&chat("1"), now));
        assert!(!rl.check(&chat("1"), now));
    }

    #[test]
    fn window_expiry_frees_capacity() {
        let rl = RateLimiter::new(1, 60);
        let t0 = Utc::now();
        assert!(rl.check(&chat("1"), t0));
        assert!(!rl.check(&chat("1"), t0 + Duration::seconds(30)));
        assert!(rl.check(&chat("1"), t0 + Duration::seconds(61)));
    }

    #[test]
    fn chats_are_independent() {
        let rl = RateLimiter::new(1, 60);
        let now = Utc::now();
        assert!(rl.check(&chat("1"), now));
        assert!(rl.check(&chat("2"), now));
    }
}
