use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Structured, chat-centric session key.
///
/// Basalt sessions are keyed by `chat_id` — one conversation per chat, as
/// the runtime has no multi-tenant user/agent split to track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub chat_id: String,
}

impl SessionKey {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
        }
    }

    pub fn format(&self) -> String {
        format!("chat:{}", self.chat_id)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("chat:")
            .ok_or_else(|| SessionError::InvalidKey(format!("missing 'chat:' prefix: {s}")))?;
        if rest.is_empty() {
            return Err(SessionError::InvalidKey(format!(
                "chat id must not be empty: {s}"
            )));
        }
        Ok(Self {
            chat_id: rest.to_string(),
        })
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

/// Role of a single message in a session's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::ToolResult => write!(f, "tool_result"),
        }
    }
}

/// A single turn stored in a session's history or persistent log.
///
/// `content` is free-form text for plain turns, or a JSON-serialised array
/// of content blocks (`text` / `image` / `tool_use` / `tool_result`) when the
/// turn carries structured blocks — callers distinguish by attempting to
/// parse `content` as a JSON array first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: String,
    /// Present only on `tool_use`/`tool_result` turns; ties a result back to
    /// its originating call so a compaction boundary never splits the pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            tool_use_id: None,
        }
    }

    pub fn with_tool_use_id(mut self, id: impl Into<String>) -> Self {
        self.tool_use_id = Some(id.into());
        self
    }

    /// Whether this message participates in a tool-use/tool-result pair that
    /// must never be split across a compaction boundary.
    pub fn is_tool_linked(&self) -> bool {
        self.tool_use_id.is_some()
    }
}

/// Source of a pinned context entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinSource {
    User,
    Auto,
}

/// A permanent piece of per-turn context that survives `/clear` and compaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub text: String,
    pub source: PinSource,
    pub created_at: String,
}

impl Pin {
    pub fn new(text: impl Into<String>, source: PinSource) -> Self {
        Self {
            text: text.into(),
            source,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A compaction-produced condensation of older history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub covers_range: (u64, u64),
    pub created_at: String,
}

/// The three model-size variants a session can select between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Small,
    Balanced,
    Large,
}

impl Default for ModelVariant {
    fn default() -> Self {
        Self::Balanced
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Small => write!(f, "small"),
            Self::Balanced => write!(f, "balanced"),
            Self::Large => write!(f, "large"),
        }
    }
}

/// In-memory mutable state for one chat's conversation.
///
/// `history` holds only the recent-window tail; the full record lives in the
/// per-chat JSONL log on disk and is rehydrated into `history` on first touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub history: Vec<Message>,
    pub pinned: Vec<Pin>,
    pub summaries: Vec<Summary>,
    pub model_id: ModelVariant,
    pub created_at: String,
    pub last_active_at: String,
    /// Monotonically increasing id assigned to each appended message,
    /// used as the `covers_range` boundary for summaries.
    pub next_msg_id: u64,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            key,
            history: Vec::new(),
            pinned: Vec::new(),
            summaries: Vec::new(),
            model_id: ModelVariant::default(),
            created_at: now.clone(),
            last_active_at: now,
            next_msg_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_simple_key() {
        let key = SessionKey::new("12345");
        let s = key.format();
        assert_eq!(s, "chat:12345");
        let parsed = SessionKey::parse(&s).expect("parse failed");
        assert_eq!(parsed, key);
    }

    #[test]
    fn parse_missing_prefix_returns_err() {
        assert!(SessionKey::parse("12345").is_err());
    }

    #[test]
    fn parse_empty_chat_id_returns_err() {
        assert!(SessionKey::parse("chat:").is_err());
    }

    #[test]
    fn tool_linked_message_detects_pairing() {
        let m = Message::new(Role::ToolResult, "{}").with_tool_use_id("call_1");
        assert!(m.is_tool_linked());
        let plain = Message::new(Role::User, "hi");
        assert!(!plain.is_tool_linked());
    }
}
