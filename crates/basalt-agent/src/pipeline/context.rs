//! Shared context interface for the agent turn pipeline.
//!
//! `MessageContext` is the single trait the host (`basalt-gateway`) must
//! implement. It keeps this crate channel-agnostic: the pipeline never
//! reaches into a concrete transport, only through this seam.

use basalt_memory::MemoryManager;
use basalt_scheduler::SchedulerHandle;
use basalt_sessions::SessionManager;
use basalt_tools::manager::TerminalManager;

use crate::runtime::AgentRuntime;

use super::workers::WorkerRegistry;

/// Minimal context interface required by the shared turn pipeline.
///
/// Implemented by `AppState` in `basalt-gateway`. Defined here (in
/// `basalt-agent`) to avoid a circular dependency: the host depends on
/// `basalt-agent`, never the reverse.
pub trait MessageContext: Send + Sync {
    fn agent(&self) -> &AgentRuntime;
    /// Per-chat history, pins, summaries, and model selection.
    fn sessions(&self) -> &SessionManager;
    /// Long-term dated-markdown memory store and its search index.
    fn memory(&self) -> &MemoryManager;
    fn terminal(&self) -> &tokio::sync::Mutex<TerminalManager>;
    fn scheduler(&self) -> &SchedulerHandle;
    /// Heartbeat/briefing/sub-agent background workers (§4.6).
    fn workers(&self) -> &dyn WorkerRegistry;
}
