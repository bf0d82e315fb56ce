//! Scheduling tool family (§4.4) — cron jobs. Reminders live alongside this
//! in `reminder.rs`; both ride the same `basalt_scheduler::SchedulerHandle`,
//! distinguished by job `name` ("reminder" vs "cron").

use std::sync::Arc;

use async_trait::async_trait;
use basalt_scheduler::{JobPayload, Schedule};
use serde_json::{json, Value};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

const JOB_NAME: &str = "cron";
const DEFAULT_TIMEZONE: &str = "Asia/Seoul";

pub struct CronTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
    chat_id: String,
}

impl<C: MessageContext + 'static> CronTool<C> {
    pub fn new(ctx: Arc<C>, chat_id: &str) -> Self {
        Self {
            ctx,
            chat_id: chat_id.to_string(),
        }
    }

    fn add(&self, input: &Value) -> ToolResult {
        let expression = match input.get("expression").and_then(|v| v.as_str()) {
            Some(e) if !e.trim().is_empty() => e.trim(),
            _ => return ToolResult::error("'expression' is required (5-field cron syntax)"),
        };
        let message = match input.get("message").and_then(|v| v.as_str()) {
            Some(m) if !m.trim().is_empty() => m.trim(),
            _ => return ToolResult::error("'message' is required"),
        };

        let schedule = Schedule::Cron {
            expression: expression.to_string(),
        };
        let timezone = input
            .get("timezone")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_TIMEZONE);
        let payload = JobPayload::AgentTurn {
            message: message.to_string(),
            context: None,
        };

        match self
            .ctx
            .scheduler()
            .add_job(&self.chat_id, JOB_NAME, schedule, timezone, payload)
        {
            Ok(job) => ToolResult::success(format!(
                "Cron job created (id: {}). Next run: {}",
                job.id,
                job.next_run.as_deref().unwrap_or("unscheduled — check the expression")
            )),
            Err(e) => ToolResult::error(format!("failed to add cron job: {e}")),
        }
    }

    fn list(&self) -> ToolResult {
        let jobs = match self.ctx.scheduler().list_jobs() {
            Ok(j) => j,
            Err(e) => return ToolResult::error(format!("failed to list cron jobs: {e}")),
        };
        let mine: Vec<String> = jobs
            .into_iter()
            .filter(|j| j.name == JOB_NAME && j.chat_id == self.chat_id)
            .map(|j| {
                format!(
                    "{} [{}] next: {}",
                    j.id,
                    j.status,
                    j.next_run.as_deref().unwrap_or("none")
                )
            })
            .collect();
        if mine.is_empty() {
            ToolResult::success("No cron jobs.")
        } else {
            ToolResult::success(mine.join("\n"))
        }
    }

    fn remove(&self, input: &Value) -> ToolResult {
        let id = match input.get("job_id").and_then(|v| v.as_str()) {
            Some(id) => id,
            None => return ToolResult::error("'job_id' is required"),
        };
        match self.ctx.scheduler().remove_job(id) {
            Ok(()) => ToolResult::success(format!("Cron job {id} removed")),
            Err(e) => ToolResult::error(format!("{e}")),
        }
    }

    fn toggle(&self, input: &Value) -> ToolResult {
        let id = match input.get("job_id").and_then(|v| v.as_str()) {
            Some(id) => id,
            None => return ToolResult::error("'job_id' is required"),
        };
        let enabled = match input.get("enabled").and_then(|v| v.as_bool()) {
            Some(e) => e,
            None => return ToolResult::error("'enabled' is required"),
        };
        match self.ctx.scheduler().set_paused(id, !enabled) {
            Ok(()) => ToolResult::success(format!(
                "Cron job {id} {}",
                if enabled { "resumed" } else { "paused" }
            )),
            Err(e) => ToolResult::error(format!("{e}")),
        }
    }

    fn run_now(&self, input: &Value) -> ToolResult {
        let id = match input.get("job_id").and_then(|v| v.as_str()) {
            Some(id) => id,
            None => return ToolResult::error("'job_id' is required"),
        };
        match self.ctx.scheduler().trigger_now(id) {
            Ok(()) => ToolResult::success(format!("Cron job {id} will run on the next tick")),
            Err(e) => ToolResult::error(format!("{e}")),
        }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for CronTool<C> {
    fn name(&self) -> &str {
        "manage_cron"
    }

    fn description(&self) -> &str {
        "Add, list, remove, pause/resume, or manually trigger a recurring cron job. \
         action=add requires expression (5-field cron syntax) and message, and accepts \
         an optional timezone (IANA name, default Asia/Seoul). \
         action=list takes no arguments. action=remove/toggle/run require job_id; \
         toggle additionally requires enabled (true to resume, false to pause)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "list", "remove", "toggle", "run"]
                },
                "expression": { "type": "string", "description": "5-field cron expression, e.g. '0 9 * * 1-5'." },
                "message": { "type": "string", "description": "Text to deliver when the job fires." },
                "timezone": { "type": "string", "description": "IANA timezone the expression is evaluated in (default Asia/Seoul)." },
                "job_id": { "type": "string" },
                "enabled": { "type": "boolean" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        match input.get("action").and_then(|v| v.as_str()) {
            Some("add") => self.add(&input),
            Some("list") => self.list(),
            Some("remove") => self.remove(&input),
            Some("toggle") => self.toggle(&input),
            Some("run") => self.run_now(&input),
            _ => ToolResult::error("'action' must be one of: add, list, remove, toggle, run"),
        }
    }
}
