//! `WorkerRegistry` — the seam `MessageContext` uses to reach the
//! background-worker subsystem (heartbeat, briefing, sub-agents) without
//! this crate depending on `basalt-workers`.
//!
//! `basalt-workers` depends on `basalt-agent` (it runs turns through the
//! same pipeline/tool layer), so the dependency only goes one way: this
//! trait is defined here and implemented there, mirroring how
//! `basalt-scheduler` avoids depending back on `basalt-agent`.

use async_trait::async_trait;

/// Persisted heartbeat state for one chat (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatStatus {
    pub enabled: bool,
    pub interval_ms: u64,
}

/// Persisted briefing state for one chat (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct BriefingStatus {
    pub enabled: bool,
    pub time_of_day: String,
    pub city: String,
    pub last_sent_date: Option<String>,
}

/// Runtime state of one sub-agent run.
#[derive(Debug, Clone, PartialEq)]
pub struct SubAgentStatus {
    pub id: String,
    pub task: String,
    pub running: bool,
    pub started_at: String,
    pub result: Option<String>,
}

#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    fn heartbeat_status(&self, chat_id: &str) -> HeartbeatStatus;
    fn set_heartbeat(
        &self,
        chat_id: &str,
        enabled: bool,
        interval_ms: Option<u64>,
    ) -> Result<HeartbeatStatus, String>;
    /// Run one heartbeat check immediately, bypassing the ticker. Returns
    /// the message delivered to the chat, or `None` if the model returned
    /// the `HEARTBEAT_OK` sentinel and nothing was sent.
    async fn run_heartbeat_check(&self, chat_id: &str) -> Result<Option<String>, String>;

    fn briefing_status(&self, chat_id: &str) -> BriefingStatus;
    fn set_briefing(
        &self,
        chat_id: &str,
        enabled: bool,
        time_of_day: Option<String>,
        city: Option<String>,
    ) -> Result<BriefingStatus, String>;
    /// Compose and deliver today's briefing immediately, regardless of
    /// `time_of_day`/`last_sent_date`. Returns the delivered text.
    async fn send_briefing_now(&self, chat_id: &str) -> Result<String, String>;

    /// Spawn an independent sub-agent to work `task`, returning its id.
    async fn spawn_agent(&self, chat_id: &str, task: String) -> Result<String, String>;
    fn list_agents(&self, chat_id: &str) -> Vec<SubAgentStatus>;
    /// Cancel a running sub-agent. Returns an error if `agent_id` is
    /// unknown or already finished.
    fn cancel_agent(&self, agent_id: &str) -> Result<(), String>;
}
