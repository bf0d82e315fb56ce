//! `AppState` — the concrete `MessageContext` implementation wiring every
//! subsystem (LLM runtime, sessions, memory, terminal, scheduler, workers)
//! into the shared turn pipeline.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use basalt_agent::pipeline::MessageContext;
use basalt_agent::runtime::AgentRuntime;
use basalt_core::config::BasaltConfig;
use basalt_memory::manager::MemoryManager;
use basalt_scheduler::SchedulerHandle;
use basalt_sessions::SessionManager;
use basalt_tools::manager::TerminalManager;
use basalt_workers::WorkerHandle;

use crate::status::StatusTracker;

/// Central shared state, held behind `Arc<AppState>` by every background
/// task (the inbound message pump, the scheduler's fired-job drain, the
/// heartbeat/briefing tickers).
pub struct AppState {
    pub config: BasaltConfig,
    agent: AgentRuntime,
    sessions: SessionManager,
    memory: MemoryManager,
    scheduler: SchedulerHandle,
    /// `tokio::sync::Mutex` since `TerminalManager`'s session/job methods are
    /// async and must be awaited while the lock is held.
    terminal: tokio::sync::Mutex<TerminalManager>,
    /// Set once `run()` constructs the worker registry, since `WorkerHandle`
    /// needs an `Arc<AppState>` to build sub-agent turns through the same
    /// pipeline — see `AppState::attach_workers`.
    workers: tokio::sync::OnceCell<Arc<WorkerHandle<AppState>>>,
    pub status: StatusTracker,
    /// In-flight turns, keyed by chat_id. §9's graceful shutdown cancels all
    /// of these before waiting out `SHUTDOWN_GRACE_MS`.
    pub active_turns: DashMap<String, CancellationToken>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BasaltConfig,
        agent: AgentRuntime,
        sessions: SessionManager,
        memory: MemoryManager,
        scheduler: SchedulerHandle,
        terminal: TerminalManager,
    ) -> Self {
        Self {
            config,
            agent,
            sessions,
            memory,
            scheduler,
            terminal: tokio::sync::Mutex::new(terminal),
            workers: tokio::sync::OnceCell::new(),
            status: StatusTracker::new(),
            active_turns: DashMap::new(),
        }
    }

    /// Plug in the worker registry once it's been built from an `Arc<AppState>`
    /// pointing back at this same state. Panics if called twice.
    pub fn attach_workers(&self, workers: Arc<WorkerHandle<AppState>>) {
        self.workers
            .set(workers)
            .unwrap_or_else(|_| panic!("AppState::attach_workers called more than once"));
    }
}

impl MessageContext for AppState {
    fn agent(&self) -> &AgentRuntime {
        &self.agent
    }

    fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    fn terminal(&self) -> &tokio::sync::Mutex<TerminalManager> {
        &self.terminal
    }

    fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    fn workers(&self) -> &dyn basalt_agent::pipeline::WorkerRegistry {
        self.workers
            .get()
            .expect("AppState::attach_workers must run before the pipeline is used")
            .as_ref()
    }
}
