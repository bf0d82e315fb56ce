use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat identifier — the key every session, job, and worker is scoped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<i64> for ChatId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// Inbound message event delivered by an Outbound Channel implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: InboundKind,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Base64-encoded, size-capped at `MAX_IMAGE_SIZE`.
    pub image_blob: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundKind {
    Text,
    Image,
}

/// A message an adapter must deliver to a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutbound {
    pub chat_id: ChatId,
    pub text: String,
}

/// Budget and timing constants from the runtime specification. Centralised
/// here so every crate reads the same numbers; `BasaltConfig::budgets` can
/// override a subset at load time.
pub mod budgets {
    pub const MAX_CONTEXT: u64 = 200_000;
    pub const MAX_HISTORY: u64 = 60_000;
    pub const MAX_PINNED: u64 = 8_000;
    pub const SUMMARY_THRESHOLD: u64 = 40_000;
    pub const COMPACTION_THRESHOLD_PCT: f64 = 0.5;
    pub const MIN_RECENT: usize = 6;
    pub const KEEP_ON_COMPACT: usize = 12;
    pub const MAX_SUMMARY_CHUNKS: usize = 5;
    pub const MAX_HISTORY_LOAD: usize = 200;
    pub const MAX_SESSIONS: usize = 500;
    pub const SESSION_TTL_SECS: i64 = 30 * 24 * 3600;
    pub const MIN_SIMILARITY: f32 = 0.25;
    pub const SEARCH_TIMEOUT_MS: u64 = 3_000;
    pub const EMBED_TIMEOUT_MS: u64 = 3_000;
    pub const MAX_URL_FETCH: usize = 3;
    pub const TYPING_REFRESH_MS: u64 = 4_000;
    pub const STREAM_EDIT_INTERVAL_MS: u64 = 800;
    pub const MAX_TOOL_ITERATIONS: usize = 12;
    pub const API_TIMEOUT_MS: u64 = 60_000;
    pub const HTTP_TIMEOUT_MS: u64 = 15_000;
    pub const MAX_RETRIES: u32 = 3;
    pub const INITIAL_RETRY_DELAY_MS: u64 = 500;
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const MAX_RETRY_DELAY_MS: u64 = 8_000;
    pub const SHUTDOWN_GRACE_MS: u64 = 5_000;
    pub const MAX_MESSAGE_LENGTH: usize = 4_096;
    pub const MAX_IMAGE_SIZE: usize = 8 * 1024 * 1024;
    pub const MAX_OUTPUT_LINES: usize = 2_000;
    pub const RATE_LIMIT_MESSAGES: u32 = 10;
    pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
}

/// Whitespace-delimited token estimator with a small overhead multiplier.
///
/// Never the source of truth for the LLM's own accounting — used only for
/// local budgeting decisions (history trimming, compaction triggers).
pub fn estimate_tokens(text: &str) -> u64 {
    let words = text.split_whitespace().count() as u64;
    // +15% overhead accounts for subword tokenisation inflating word counts.
    words + words / 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_counts_whitespace_words() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one two three"), 3 + 0);
        assert_eq!(estimate_tokens("a b c d e f g"), 7 + 1);
    }

    #[test]
    fn chat_id_conversions_roundtrip() {
        let a: ChatId = "12345".into();
        let b: ChatId = 12345i64.into();
        assert_eq!(a, b);
    }
}
