//! Startup and the main runtime loop (§9): build every subsystem, connect
//! the outbound channel, drain fired scheduler jobs and inbound chat events,
//! run the heartbeat/briefing tickers, and shut down gracefully on signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use basalt_agent::anthropic::AnthropicProvider;
use basalt_agent::pipeline::process_message_non_streaming;
use basalt_agent::prompt::PromptBuilder;
use basalt_agent::runtime::AgentRuntime;
use basalt_channel::telegram::TelegramChannel;
use basalt_channel::{ChannelManager, ChatId, InboundEvent, OutboundChannel};
use basalt_core::config::BasaltConfig;
use basalt_core::types::budgets::SHUTDOWN_GRACE_MS;
use basalt_memory::manager::MemoryManager;
use basalt_scheduler::{JobPayload, SchedulerEngine, SchedulerHandle};
use basalt_sessions::SessionManager;
use basalt_tools::manager::TerminalManager;
use basalt_workers::WorkerHandle;

use crate::app::AppState;
use crate::status::write_status;

const CHANNEL_NAME: &str = "telegram";
const BRIEFING_TICK: Duration = Duration::from_secs(60);
const STATUS_WRITE_INTERVAL: Duration = Duration::from_secs(10);

fn open_db(path: &std::path::Path) -> anyhow::Result<rusqlite::Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=3000;")?;
    Ok(conn)
}

/// Build every subsystem and run until SIGINT/SIGTERM.
pub async fn run(config: BasaltConfig) -> anyhow::Result<()> {
    let workspace_root = std::path::PathBuf::from(&config.workspace.root);
    std::fs::create_dir_all(&workspace_root)?;

    let api_key = config
        .agent
        .api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("agent.api_key is not set; run `secret set llm-api-key <key>` first"))?;
    let provider = Box::new(AnthropicProvider::new(api_key, None));
    let prompt = PromptBuilder::load(None, Some(&config.workspace.root));
    let agent = AgentRuntime::new(
        provider,
        prompt,
        config.agent.small_model.clone(),
        config.agent.balanced_model.clone(),
        config.agent.large_model.clone(),
    );

    let sessions = SessionManager::new(workspace_root.clone());

    let memory_conn = open_db(&workspace_root.join("memory.db"))?;
    let memory = MemoryManager::new(workspace_root.clone(), memory_conn)?;

    let scheduler_handle = SchedulerHandle::new(open_db(&workspace_root.join("scheduler.db"))?)?;
    let (fired_tx, fired_rx) = mpsc::channel::<basalt_scheduler::Job>(64);
    let scheduler_engine = SchedulerEngine::new(open_db(&workspace_root.join("scheduler.db"))?, Some(fired_tx))?;

    let terminal = TerminalManager::new();

    let state = Arc::new(AppState::new(
        config.clone(),
        agent,
        sessions,
        memory,
        scheduler_handle,
        terminal,
    ));

    let mut channels = ChannelManager::new();
    let telegram_token = config
        .channel
        .telegram_bot_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("channel.telegram_bot_token is not set; run `secret set telegram-bot-token <token>` first"))?;
    let mut telegram = TelegramChannel::new(telegram_token, config.channel.allowed_chats.clone());
    let inbound_rx = telegram.subscribe();
    channels.register(Box::new(telegram));
    channels.connect_all().await;
    let mut channels = Arc::new(channels);

    let workers = WorkerHandle::new(Arc::clone(&state), workspace_root.clone(), Arc::clone(&channels), CHANNEL_NAME)?;
    state.attach_workers(Arc::clone(&workers));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task = tokio::spawn(scheduler_engine.run(shutdown_rx.clone()));
    let fired_job_task = tokio::spawn(drain_fired_jobs(Arc::clone(&state), Arc::clone(&channels), fired_rx, shutdown_rx.clone()));
    let inbound_task = tokio::spawn(pump_inbound(Arc::clone(&state), Arc::clone(&channels), inbound_rx, shutdown_rx.clone()));
    let heartbeat_task = tokio::spawn(run_heartbeat_ticker(Arc::clone(&workers), shutdown_rx.clone()));
    let briefing_task = tokio::spawn(run_briefing_ticker(Arc::clone(&workers), shutdown_rx.clone()));
    let status_task = tokio::spawn(run_status_writer(Arc::clone(&state), workspace_root.clone(), shutdown_rx.clone()));

    info!("basalt-gateway running");
    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining in-flight turns");

    let _ = shutdown_tx.send(true);
    for entry in state.active_turns.iter() {
        entry.value().cancel();
    }

    let _ = tokio::time::timeout(
        Duration::from_millis(SHUTDOWN_GRACE_MS),
        futures_util::future::join_all([scheduler_task, fired_job_task, inbound_task, heartbeat_task, briefing_task, status_task]),
    )
    .await;

    if let Some(channels_mut) = Arc::get_mut(&mut channels) {
        channels_mut.disconnect_all().await;
    }
    write_status(&workspace_root, &state.status.snapshot())?;
    info!("shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

/// Deliver fired scheduler jobs: `SystemEvent` posts its message directly,
/// `AgentTurn` runs a full pipeline turn and posts the result.
async fn drain_fired_jobs(
    state: Arc<AppState>,
    channels: Arc<ChannelManager>,
    mut fired_rx: mpsc::Receiver<basalt_scheduler::Job>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            job = fired_rx.recv() => {
                let Some(job) = job else { break };
                match job.payload {
                    JobPayload::SystemEvent { event_type, data } => {
                        let text = data
                            .get("message")
                            .and_then(|v| v.as_str())
                            .map(String::from)
                            .unwrap_or_else(|| format!("[{event_type}]"));
                        deliver(&channels, &job.chat_id, &text).await;
                    }
                    JobPayload::AgentTurn { message, context: _ } => {
                        match process_message_non_streaming(&state, &job.chat_id, CHANNEL_NAME, &message, None, None, None).await {
                            Ok(result) => {
                                state.status.record_message();
                                deliver(&channels, &job.chat_id, &result.content).await;
                            }
                            Err(e) => {
                                state.status.record_error();
                                warn!(chat_id = %job.chat_id, error = %e, "scheduled agent turn failed");
                            }
                        }
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break; }
            }
        }
    }
}

/// Drain inbound chat events and run each through the turn pipeline.
async fn pump_inbound(
    state: Arc<AppState>,
    channels: Arc<ChannelManager>,
    mut inbound_rx: mpsc::Receiver<InboundEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = inbound_rx.recv() => {
                let Some(event) = event else { break };
                let state = Arc::clone(&state);
                let channels = Arc::clone(&channels);
                tokio::spawn(async move { handle_inbound(state, channels, event).await });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break; }
            }
        }
    }
}

async fn handle_inbound(state: Arc<AppState>, channels: Arc<ChannelManager>, event: InboundEvent) {
    let chat_id = event.chat_id.as_str().to_string();
    let text = match (event.text, event.caption) {
        (Some(t), _) if !t.is_empty() => t,
        (_, Some(c)) if !c.is_empty() => c,
        _ => return,
    };

    let attachments = event.image_blob.map(|b64| {
        vec![serde_json::json!({
            "type": "image",
            "source": { "type": "base64", "media_type": "image/jpeg", "data": b64 }
        })]
    });

    let cancel = tokio_util::sync::CancellationToken::new();
    state.active_turns.insert(chat_id.clone(), cancel.clone());

    let result = process_message_non_streaming(&state, &chat_id, CHANNEL_NAME, &text, None, Some(cancel), attachments).await;
    state.active_turns.remove(&chat_id);

    match result {
        Ok(processed) => {
            state.status.record_message();
            deliver(&channels, &chat_id, &processed.content).await;
        }
        Err(e) => {
            state.status.record_error();
            error!(chat_id = %chat_id, error = %e, "turn failed");
            deliver(&channels, &chat_id, "Sorry, something went wrong processing that.").await;
        }
    }
}

async fn deliver(channels: &ChannelManager, chat_id: &str, text: &str) {
    let chat = ChatId::from(chat_id.to_string());
    if let Err(e) = channels.send_message(CHANNEL_NAME, &chat, text).await {
        error!(chat_id, error = %e, "failed to deliver message");
    }
}

async fn run_heartbeat_ticker<C: basalt_agent::pipeline::MessageContext + 'static>(
    workers: Arc<WorkerHandle<C>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = interval.tick() => workers.heartbeat_tick().await,
            _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
        }
    }
}

async fn run_briefing_ticker<C: basalt_agent::pipeline::MessageContext + 'static>(
    workers: Arc<WorkerHandle<C>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(BRIEFING_TICK);
    loop {
        tokio::select! {
            _ = interval.tick() => workers.briefing_tick().await,
            _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
        }
    }
}

async fn run_status_writer(state: Arc<AppState>, workspace_root: std::path::PathBuf, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(STATUS_WRITE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = write_status(&workspace_root, &state.status.snapshot()) {
                    warn!(error = %e, "failed to write status snapshot");
                }
            }
            _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
        }
    }
}
