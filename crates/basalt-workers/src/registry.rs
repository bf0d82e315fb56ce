//! `WorkerHandle` — the concrete background-worker subsystem: owns the
//! persisted heartbeat/briefing config, the in-memory timing/single-flight
//! state the spec keeps out of persistence, the sub-agent registry, and
//! delivery of results back to chats through a `basalt_channel::ChannelManager`.
//!
//! Implements `basalt_agent::pipeline::WorkerRegistry`, the seam `MessageContext`
//! exposes so tools can reach this subsystem without `basalt-agent` depending
//! on this crate.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use uuid::Uuid;

use basalt_agent::pipeline::{
    BriefingStatus as PipelineBriefingStatus, HeartbeatStatus as PipelineHeartbeatStatus,
    MessageContext, SubAgentStatus as PipelineSubAgentStatus, WorkerRegistry,
};
use basalt_channel::{ChannelManager, ChatId};
use basalt_core::types::budgets::MAX_MESSAGE_LENGTH;

use crate::store::WorkerStore;
use crate::types::{BriefingConfig, HeartbeatConfig};
use crate::{briefing, heartbeat, subagent};

/// In-memory-only timing state the spec explicitly keeps out of persistence.
#[derive(Default)]
struct HeartbeatTiming {
    last_check_at: Option<chrono::DateTime<Utc>>,
    in_flight: bool,
}

struct SubAgentEntry {
    chat_id: String,
    task: String,
    started_at: String,
    cancel: CancellationToken,
    running: bool,
    result: Option<String>,
}

pub struct WorkerHandle<C: MessageContext + 'static> {
    ctx: Arc<C>,
    workspace_root: PathBuf,
    store: WorkerStore,
    heartbeats: DashMap<String, HeartbeatConfig>,
    heartbeat_timing: DashMap<String, HeartbeatTiming>,
    briefings: DashMap<String, BriefingConfig>,
    subagents: DashMap<String, SubAgentEntry>,
    channels: Arc<ChannelManager>,
    channel_name: String,
    /// Populated right after construction so trait methods taking `&self`
    /// (the `WorkerRegistry` signature) can still hand a `'static` `Arc<Self>`
    /// to spawned tasks that outlive the call.
    self_weak: std::sync::OnceLock<std::sync::Weak<Self>>,
}

impl<C: MessageContext + 'static> WorkerHandle<C> {
    pub fn new(
        ctx: Arc<C>,
        workspace_root: impl Into<PathBuf>,
        channels: Arc<ChannelManager>,
        channel_name: impl Into<String>,
    ) -> basalt_core::Result<Arc<Self>> {
        let workspace_root = workspace_root.into();
        let store = WorkerStore::new(workspace_root.clone());
        let heartbeats = DashMap::new();
        for cfg in store.load_heartbeats()? {
            heartbeats.insert(cfg.chat_id.clone(), cfg);
        }
        let briefings = DashMap::new();
        for cfg in store.load_briefings()? {
            briefings.insert(cfg.chat_id.clone(), cfg);
        }

        let handle = Arc::new(Self {
            ctx,
            workspace_root,
            store,
            heartbeats,
            heartbeat_timing: DashMap::new(),
            briefings,
            subagents: DashMap::new(),
            channels,
            channel_name: channel_name.into(),
            self_weak: std::sync::OnceLock::new(),
        });
        let _ = handle.self_weak.set(Arc::downgrade(&handle));
        Ok(handle)
    }

    fn self_arc(&self) -> Arc<Self> {
        self.self_weak
            .get()
            .and_then(|w| w.upgrade())
            .expect("WorkerHandle always constructed via WorkerHandle::new")
    }

    fn checklist_path(&self, chat_id: &str) -> PathBuf {
        self.workspace_root.join(format!("heartbeat-{chat_id}.md"))
    }

    fn load_checklist(&self, chat_id: &str) -> Option<String> {
        std::fs::read_to_string(self.checklist_path(chat_id)).ok()
    }

    fn persist_heartbeats(&self) {
        let items: Vec<_> = self.heartbeats.iter().map(|e| e.value().clone()).collect();
        if let Err(err) = self.store.save_heartbeats(items) {
            error!(%err, "failed to persist heartbeat config");
        }
    }

    fn persist_briefings(&self) {
        let items: Vec<_> = self.briefings.iter().map(|e| e.value().clone()).collect();
        if let Err(err) = self.store.save_briefings(items) {
            error!(%err, "failed to persist briefing config");
        }
    }

    async fn deliver(&self, chat_id: &str, text: &str) {
        let chat = ChatId::from(chat_id.to_string());
        if let Err(err) = self.channels.send_message(&self.channel_name, &chat, text).await {
            error!(chat_id, %err, "failed to deliver worker message");
        }
    }

    /// Run one heartbeat pass over every enabled, due chat. Called once per
    /// tick by the ticker spawned in `basalt-gateway`'s startup path.
    pub async fn heartbeat_tick(self: &Arc<Self>) {
        let due: Vec<String> = self
            .heartbeats
            .iter()
            .filter(|e| e.value().enabled)
            .filter_map(|e| {
                let chat_id = e.key().clone();
                let interval_ms = e.value().interval_ms;
                let mut timing = self.heartbeat_timing.entry(chat_id.clone()).or_default();
                if timing.in_flight {
                    return None;
                }
                let elapsed_ok = timing
                    .last_check_at
                    .map(|t| (Utc::now() - t).num_milliseconds() as u64 >= interval_ms)
                    .unwrap_or(true);
                if !elapsed_ok {
                    return None;
                }
                timing.in_flight = true;
                Some(chat_id)
            })
            .collect();

        for chat_id in due {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let result = this.run_heartbeat_check(&chat_id).await;
                if let Some(mut timing) = this.heartbeat_timing.get_mut(&chat_id) {
                    timing.in_flight = false;
                    timing.last_check_at = Some(Utc::now());
                }
                match result {
                    Ok(Some(message)) => this.deliver(&chat_id, &message).await,
                    Ok(None) => {}
                    Err(err) => warn!(chat_id, %err, "heartbeat check failed"),
                }
            });
        }
    }

    /// Scan all briefing configs once; called once per minute by the ticker.
    pub async fn briefing_tick(self: &Arc<Self>) {
        let now = Utc::now();
        let due: Vec<BriefingConfig> = self
            .briefings
            .iter()
            .filter(|e| {
                let cfg = e.value();
                cfg.enabled && briefing::is_due(&cfg.time_of_day, cfg.last_sent_date.as_deref(), now)
            })
            .map(|e| e.value().clone())
            .collect();

        for cfg in due {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                match this.send_briefing_now(&cfg.chat_id).await {
                    Ok(_) => {}
                    Err(err) => warn!(chat_id = %cfg.chat_id, %err, "briefing send failed"),
                }
            });
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> WorkerRegistry for WorkerHandle<C> {
    fn heartbeat_status(&self, chat_id: &str) -> PipelineHeartbeatStatus {
        let cfg = self.heartbeats.get(chat_id).map(|e| e.value().clone()).unwrap_or_default();
        PipelineHeartbeatStatus {
            enabled: cfg.enabled,
            interval_ms: cfg.interval_ms,
        }
    }

    fn set_heartbeat(
        &self,
        chat_id: &str,
        enabled: bool,
        interval_ms: Option<u64>,
    ) -> Result<PipelineHeartbeatStatus, String> {
        let mut cfg = self
            .heartbeats
            .get(chat_id)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| HeartbeatConfig {
                chat_id: chat_id.to_string(),
                ..Default::default()
            });
        cfg.enabled = enabled;
        if let Some(ms) = interval_ms {
            cfg.interval_ms = ms;
        }
        if !enabled {
            self.heartbeat_timing.remove(chat_id);
        }
        self.heartbeats.insert(chat_id.to_string(), cfg.clone());
        self.persist_heartbeats();
        Ok(PipelineHeartbeatStatus {
            enabled: cfg.enabled,
            interval_ms: cfg.interval_ms,
        })
    }

    async fn run_heartbeat_check(&self, chat_id: &str) -> Result<Option<String>, String> {
        let checklist = self.load_checklist(chat_id);
        heartbeat::run_check(&self.ctx, chat_id, checklist.as_deref())
            .await
            .map_err(|err| err.to_string())
    }

    fn briefing_status(&self, chat_id: &str) -> PipelineBriefingStatus {
        let cfg = self.briefings.get(chat_id).map(|e| e.value().clone()).unwrap_or_default();
        PipelineBriefingStatus {
            enabled: cfg.enabled,
            time_of_day: cfg.time_of_day,
            city: cfg.city,
            last_sent_date: cfg.last_sent_date,
        }
    }

    fn set_briefing(
        &self,
        chat_id: &str,
        enabled: bool,
        time_of_day: Option<String>,
        city: Option<String>,
    ) -> Result<PipelineBriefingStatus, String> {
        let mut cfg = self
            .briefings
            .get(chat_id)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| BriefingConfig {
                chat_id: chat_id.to_string(),
                ..Default::default()
            });
        cfg.enabled = enabled;
        if let Some(t) = time_of_day {
            cfg.time_of_day = t;
        }
        if let Some(c) = city {
            cfg.city = c;
        }
        self.briefings.insert(chat_id.to_string(), cfg.clone());
        self.persist_briefings();
        Ok(PipelineBriefingStatus {
            enabled: cfg.enabled,
            time_of_day: cfg.time_of_day,
            city: cfg.city,
            last_sent_date: cfg.last_sent_date,
        })
    }

    async fn send_briefing_now(&self, chat_id: &str) -> Result<String, String> {
        let city = self
            .briefings
            .get(chat_id)
            .map(|e| e.value().city.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "your area".to_string());

        let text = briefing::compose(&self.ctx, &city).await.map_err(|e| e.to_string())?;
        self.deliver(chat_id, &text).await;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        if let Some(mut cfg) = self.briefings.get_mut(chat_id) {
            cfg.last_sent_date = Some(today);
        }
        self.persist_briefings();
        Ok(text)
    }

    async fn spawn_agent(&self, chat_id: &str, task: String) -> Result<String, String> {
        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let started_at = Utc::now().to_rfc3339();

        self.subagents.insert(
            id.clone(),
            SubAgentEntry {
                chat_id: chat_id.to_string(),
                task: task.clone(),
                started_at,
                cancel: cancel.clone(),
                running: true,
                result: None,
            },
        );

        let this = self.self_arc();
        let chat_id_owned = chat_id.to_string();
        let agent_id = id.clone();

        tokio::spawn(async move {
            let outcome = subagent::run(Arc::clone(&this.ctx), &chat_id_owned, &task, &cancel).await;
            let summary = match &outcome {
                Ok(text) => text.clone(),
                Err(err) => format!("sub-agent failed: {err}"),
            };
            if let Some(mut entry) = this.subagents.get_mut(&agent_id) {
                entry.running = false;
                entry.result = Some(summary.clone());
            }
            let chat = ChatId::from(chat_id_owned.clone());
            let preview = if summary.len() > MAX_MESSAGE_LENGTH {
                format!("{}…", &summary[..MAX_MESSAGE_LENGTH.saturating_sub(1)])
            } else {
                summary
            };
            if let Err(err) = this.channels.send_message(&this.channel_name, &chat, &preview).await {
                error!(chat_id = %chat_id_owned, %err, "failed to deliver sub-agent result");
            }
        });

        Ok(id)
    }

    fn list_agents(&self, chat_id: &str) -> Vec<PipelineSubAgentStatus> {
        self.subagents
            .iter()
            .filter(|e| e.value().chat_id == chat_id)
            .map(|e| {
                let entry = e.value();
                PipelineSubAgentStatus {
                    id: e.key().clone(),
                    task: entry.task.clone(),
                    running: entry.running,
                    started_at: entry.started_at.clone(),
                    result: entry.result.clone(),
                }
            })
            .collect()
    }

    fn cancel_agent(&self, agent_id: &str) -> Result<(), String> {
        let entry = self
            .subagents
            .get(agent_id)
            .ok_or_else(|| format!("unknown sub-agent id: {agent_id}"))?;
        entry.value().cancel.cancel();
        Ok(())
    }
}
