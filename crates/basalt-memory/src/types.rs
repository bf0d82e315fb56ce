use serde::{Deserialize, Serialize};

/// A single fact recorded in a dated memory file.
///
/// Canonical state lives in `memory/YYYY-MM-DD.md` as one `- <text>` bullet
/// per entry; this struct is the parsed/indexed view used by search. The
/// derived FTS5 index is rebuildable from these files at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    pub date: String,
    pub text: String,
}

/// A single search hit with its combined hybrid score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub entry: MemoryEntry,
    pub score: f32,
}

/// Tool-call frequency record used to surface "hot topics" in the system
/// prompt without the LLM ever seeing the raw counts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolCallLog {
    /// tool_name -> timestamps (RFC3339) of recent invocations.
    pub calls: std::collections::HashMap<String, Vec<String>>,
}

/// A knowledge base entry — operator or bot-authored fact, separate from
/// per-chat memory but searched through the same FTS index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub topic: String,
    pub content: String,
    pub tags: String,
}
