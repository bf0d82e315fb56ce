use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

use basalt_core::types::{budgets, estimate_tokens};

use crate::error::Result;
use crate::types::{Message, ModelVariant, Pin, PinSource, Session, SessionKey, Summary};

tokio::task_local! {
    /// The chat a tool invocation is currently executing on behalf of.
    /// Set by `with_chat` before the pipeline runs a turn; never a
    /// process-global so concurrent turns on different chats never collide.
    static CURRENT_CHAT: String;
}

/// Returns the chat id set by the innermost `with_chat` call, if any.
pub fn current_chat() -> Option<String> {
    CURRENT_CHAT.try_with(|c| c.clone()).ok()
}

/// Thread-safe, file-backed manager for per-chat session state.
///
/// Each chat's session lives behind its own `tokio::sync::Mutex` so a
/// running turn holds only that chat's lock; the map itself uses a
/// lock-free `DashMap` for insertion/eviction bookkeeping.
pub struct SessionManager {
    sessions: DashMap<String, Arc<AsyncMutex<Session>>>,
    workspace_root: PathBuf,
}

impl SessionManager {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            sessions: DashMap::new(),
            workspace_root: workspace_root.into(),
        }
    }

    fn log_path(&self, chat_id: &str) -> PathBuf {
        self.workspace_root.join("sessions").join(format!("{chat_id}.jsonl"))
    }

    fn pins_path(&self, chat_id: &str) -> PathBuf {
        self.workspace_root.join("pins").join(format!("{chat_id}.json"))
    }

    /// Run `f` with `chat_id` bound as the task-local current chat, so any
    /// tool invoked during `f` can resolve it via `current_chat()`.
    pub async fn with_chat<F, Fut, T>(&self, chat_id: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        CURRENT_CHAT.scope(chat_id.to_string(), f()).await
    }

    /// Return the session for `chat_id`, creating and rehydrating it from
    /// disk if this is the first touch since startup.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, chat_id: &str) -> Result<Arc<AsyncMutex<Session>>> {
        if let Some(existing) = self.sessions.get(chat_id) {
            existing.lock().await.last_active_at = chrono::Utc::now().to_rfc3339();
            return Ok(Arc::clone(existing.value()));
        }

        self.evict_if_over_capacity();

        let key = SessionKey::new(chat_id);
        let mut session = Session::new(key);

        let tail: Vec<Message> =
            basalt_core::fs::tail_jsonl(&self.log_path(chat_id), budgets::MAX_HISTORY_LOAD as usize)
                .unwrap_or_default();
        session.next_msg_id = tail.len() as u64;
        session.history = tail;

        let pins: Vec<Pin> =
            basalt_core::fs::read_json_or_default(&self.pins_path(chat_id)).unwrap_or_default();
        session.pinned = pins;

        debug!(chat_id, history = session.history.len(), "session rehydrated");
        let handle = Arc::new(AsyncMutex::new(session));
        self.sessions.insert(chat_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Append a turn to in-memory history and the persistent log, in that
    /// order. Returns `true` if the append pushed history over the soft
    /// token ceiling, signalling the caller should run compaction.
    #[instrument(skip(self, content))]
    pub async fn append_message(
        &self,
        chat_id: &str,
        role: crate::types::Role,
        content: &str,
        tool_use_id: Option<String>,
    ) -> Result<bool> {
        let handle = self.get_or_create(chat_id).await?;
        let mut session = handle.lock().await;

        let mut msg = Message::new(role, content);
        msg.tool_use_id = tool_use_id;
        session.history.push(msg.clone());
        session.next_msg_id += 1;
        session.last_active_at = chrono::Utc::now().to_rfc3339();

        basalt_core::fs::append_jsonl(&self.log_path(chat_id), &msg)?;

        let history_tokens: u64 = session
            .history
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();
        Ok(history_tokens > budgets::MAX_HISTORY)
    }

    /// Replace a chat's history wholesale (used by compaction). The caller
    /// is responsible for computing the replacement; this just persists it
    /// as the new in-memory tail — the on-disk log is append-only and keeps
    /// the full pre-compaction record.
    pub async fn replace_history(&self, chat_id: &str, new_history: Vec<Message>) -> Result<()> {
        let handle = self.get_or_create(chat_id).await?;
        let mut session = handle.lock().await;
        session.history = new_history;
        Ok(())
    }

    /// Pop the most recently appended message (rollback after a failed
    /// turn, so a retry does not double-insert the user's message).
    pub async fn rollback_last(&self, chat_id: &str) -> Result<()> {
        let handle = self.get_or_create(chat_id).await?;
        let mut session = handle.lock().await;
        session.history.pop();
        Ok(())
    }

    /// Append a pin. Returns `false` without mutating state if the new pin
    /// would push `tokens(pinned)` over `MAX_PINNED`.
    #[instrument(skip(self, text))]
    pub async fn pin(&self, chat_id: &str, text: &str, source: PinSource) -> Result<bool> {
        let handle = self.get_or_create(chat_id).await?;
        let mut session = handle.lock().await;

        let current: u64 = session.pinned.iter().map(|p| estimate_tokens(&p.text)).sum();
        if current + estimate_tokens(text) > budgets::MAX_PINNED {
            warn!(chat_id, "pin rejected: would exceed MAX_PINNED");
            return Ok(false);
        }

        session.pinned.push(Pin::new(text, source));
        let pins = session.pinned.clone();
        drop(session);
        basalt_core::fs::write_json_atomic(&self.pins_path(chat_id), &pins)?;
        Ok(true)
    }

    /// Snapshot of the in-memory history tail, for prompt assembly and
    /// compaction — never the full on-disk log.
    pub async fn history(&self, chat_id: &str) -> Result<Vec<Message>> {
        let handle = self.get_or_create(chat_id).await?;
        let history = handle.lock().await.history.clone();
        Ok(history)
    }

    pub async fn pins(&self, chat_id: &str) -> Result<Vec<Pin>> {
        let handle = self.get_or_create(chat_id).await?;
        let pinned = handle.lock().await.pinned.clone();
        Ok(pinned)
    }

    pub async fn summaries(&self, chat_id: &str) -> Result<Vec<crate::types::Summary>> {
        let handle = self.get_or_create(chat_id).await?;
        let summaries = handle.lock().await.summaries.clone();
        Ok(summaries)
    }

    pub async fn model(&self, chat_id: &str) -> Result<ModelVariant> {
        let handle = self.get_or_create(chat_id).await?;
        let model_id = handle.lock().await.model_id;
        Ok(model_id)
    }

    pub async fn stats(&self, chat_id: &str) -> Result<SessionStats> {
        let handle = self.get_or_create(chat_id).await?;
        let session = handle.lock().await;
        Ok(SessionStats {
            message_count: session.history.len(),
            pinned_count: session.pinned.len(),
            summary_count: session.summaries.len(),
            history_tokens: session.history.iter().map(|m| estimate_tokens(&m.content)).sum(),
            pinned_tokens: session.pinned.iter().map(|p| estimate_tokens(&p.text)).sum(),
            model_id: session.model_id,
        })
    }

    /// Clear in-memory history (pins survive). The on-disk log is untouched;
    /// this only resets what gets loaded into future prompts.
    pub async fn clear_history(&self, chat_id: &str) -> Result<()> {
        let handle = self.get_or_create(chat_id).await?;
        let mut session = handle.lock().await;
        session.history.clear();
        session.summaries.clear();
        Ok(())
    }

    pub async fn set_model(&self, chat_id: &str, model: ModelVariant) -> Result<()> {
        let handle = self.get_or_create(chat_id).await?;
        handle.lock().await.model_id = model;
        Ok(())
    }

    /// Apply the result of a compaction pass: swap in the new (condensed)
    /// history and record the summary, absorbing the oldest entry into a
    /// merged one when the list would exceed `MAX_SUMMARY_CHUNKS`.
    pub async fn apply_compaction(
        &self,
        chat_id: &str,
        new_history: Vec<Message>,
        summary: Summary,
    ) -> Result<()> {
        let handle = self.get_or_create(chat_id).await?;
        let mut session = handle.lock().await;
        session.history = new_history;
        session.summaries.push(summary);
        if session.summaries.len() > budgets::MAX_SUMMARY_CHUNKS {
            let oldest = session.summaries.remove(0);
            let absorbed = session.summaries.remove(0);
            let merged = Summary {
                text: format!("{}\n{}", oldest.text, absorbed.text),
                covers_range: (oldest.covers_range.0, absorbed.covers_range.1),
                created_at: absorbed.created_at,
            };
            session.summaries.insert(0, merged);
        }
        Ok(())
    }

    /// Evict the least-recently-active session when the map is over
    /// capacity. A session active within the last minute is never evicted.
    fn evict_if_over_capacity(&self) {
        if self.sessions.len() < budgets::MAX_SESSIONS {
            return;
        }
        let now = chrono::Utc::now();
        let mut oldest: Option<(String, chrono::DateTime<chrono::Utc>)> = None;
        for entry in self.sessions.iter() {
            if let Ok(guard) = entry.value().try_lock() {
                let last_active = chrono::DateTime::parse_from_rfc3339(&guard.last_active_at)
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or(now);
                if now.signed_duration_since(last_active).num_seconds() < 60 {
                    continue;
                }
                if oldest.as_ref().map(|(_, t)| last_active < *t).unwrap_or(true) {
                    oldest = Some((entry.key().clone(), last_active));
                }
            }
        }
        if let Some((chat_id, _)) = oldest {
            info!(chat_id, "evicting least-recently-active session");
            self.sessions.remove(&chat_id);
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

#[derive(Debug, Clone)]
pub struct SessionStats {
    pub message_count: usize,
    pub pinned_count: usize,
    pub summary_count: usize,
    pub history_tokens: u64,
    pub pinned_tokens: u64,
    pub model_id: ModelVariant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn manager() -> (tempfile::TempDir, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SessionManager::new(dir.path());
        (dir, mgr)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let (_dir, mgr) = manager();
        let a = mgr.get_or_create("42").await.unwrap();
        let b = mgr.get_or_create("42").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn append_then_rehydrate_from_log() {
        let (dir, mgr) = manager();
        mgr.append_message("7", Role::User, "hello", None).await.unwrap();
        mgr.append_message("7", Role::Assistant, "hi there", None).await.unwrap();

        // Fresh manager over the same workspace root rehydrates from the log.
        let mgr2 = SessionManager::new(dir.path());
        let handle = mgr2.get_or_create("7").await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].content, "hello");
    }

    #[tokio::test]
    async fn pin_rejects_over_budget_without_mutation() {
        let (_dir, mgr) = manager();
        let huge = "word ".repeat((budgets::MAX_PINNED + 100) as usize);
        let ok = mgr.pin("1", &huge, PinSource::User).await.unwrap();
        assert!(!ok);
        let stats = mgr.stats("1").await.unwrap();
        assert_eq!(stats.pinned_count, 0);
    }

    #[tokio::test]
    async fn pin_accepts_within_budget() {
        let (_dir, mgr) = manager();
        let ok = mgr.pin("1", "remember this", PinSource::User).await.unwrap();
        assert!(ok);
        let stats = mgr.stats("1").await.unwrap();
        assert_eq!(stats.pinned_count, 1);
    }

    #[tokio::test]
    async fn clear_history_preserves_pins() {
        let (_dir, mgr) = manager();
        mgr.pin("1", "keep me", PinSource::User).await.unwrap();
        mgr.append_message("1", Role::User, "hi", None).await.unwrap();
        mgr.clear_history("1").await.unwrap();
        let stats = mgr.stats("1").await.unwrap();
        assert_eq!(stats.message_count, 0);
        assert_eq!(stats.pinned_count, 1);
    }

    #[tokio::test]
    async fn rollback_pops_last_message() {
        let (_dir, mgr) = manager();
        mgr.append_message("1", Role::User, "will be rolled back", None)
            .await
            .unwrap();
        mgr.rollback_last("1").await.unwrap();
        let stats = mgr.stats("1").await.unwrap();
        assert_eq!(stats.message_count, 0);
    }

    #[tokio::test]
    async fn apply_compaction_absorbs_oldest_summary_on_overflow() {
        let (_dir, mgr) = manager();
        for i in 0..budgets::MAX_SUMMARY_CHUNKS {
            mgr.apply_compaction(
                "1",
                vec![Message::new(Role::User, "recent")],
                Summary {
                    text: format!("summary {i}"),
                    covers_range: (i as u64, i as u64 + 1),
                    created_at: chrono::Utc::now().to_rfc3339(),
                },
            )
            .await
            .unwrap();
        }
        let handle = mgr.get_or_create("1").await.unwrap();
        assert_eq!(handle.lock().await.summaries.len(), budgets::MAX_SUMMARY_CHUNKS);

        mgr.apply_compaction(
            "1",
            vec![Message::new(Role::User, "recent")],
            Summary {
                text: "newest".to_string(),
                covers_range: (99, 100),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        )
        .await
        .unwrap();
        let session = handle.lock().await;
        assert_eq!(session.summaries.len(), budgets::MAX_SUMMARY_CHUNKS);
        assert!(session.summaries[0].text.contains("summary 0"));
    }

    #[tokio::test]
    async fn with_chat_exposes_current_chat() {
        let (_dir, mgr) = manager();
        let seen = mgr
            .with_chat("99", || async { current_chat() })
            .await;
        assert_eq!(seen.as_deref(), Some("99"));
        assert_eq!(current_chat(), None);
    }
}
