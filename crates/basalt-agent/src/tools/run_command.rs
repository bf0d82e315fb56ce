//! Shell tool family (§4.4.2): `run_command` is the foreground-or-background
//! entry point, and `list_sessions`/`get_session_log`/`kill_session` manage
//! the background sessions it spawns.

use std::sync::Arc;

use async_trait::async_trait;
use basalt_tools::{ExecOptions, JobId};
use serde_json::{json, Value};

use crate::pipeline::context::MessageContext;

use super::{Tool, ToolResult};

pub struct RunCommandTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> RunCommandTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for RunCommandTool<C> {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command. In the foreground (default) it blocks until the \
         command finishes or times out and returns stdout/stderr/exit code \
         directly. With background=true it detaches the command and returns a \
         session id immediately — check on it with list_sessions/get_session_log, \
         or stop it with kill_session."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The shell command to run." },
                "background": {
                    "type": "boolean",
                    "description": "Detach and run asynchronously instead of blocking. Default false."
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Foreground-only. Max seconds to wait before killing the command. Default 30, max 300."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let command = match input.get("command").and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => c,
            _ => return ToolResult::error("'command' is required"),
        };
        let background = input.get("background").and_then(|v| v.as_bool()).unwrap_or(false);

        if background {
            let mut terminal = self.ctx.terminal().lock().await;
            return match terminal.exec_background(command).await {
                Ok(id) => ToolResult::success(format!("Started background session {id}")),
                Err(e) => ToolResult::error(format!("failed to start background session: {e}")),
            };
        }

        let mut options = ExecOptions::default();
        if let Some(secs) = input.get("timeout_secs").and_then(|v| v.as_u64()) {
            options.timeout_secs = secs;
        }

        let terminal = self.ctx.terminal().lock().await;
        match terminal.exec(command, options).await {
            Ok(result) => ToolResult::success(format!(
                "exit code: {}\nstdout:\n{}\nstderr:\n{}",
                result.exit_code, result.stdout, result.stderr
            )),
            Err(e) => ToolResult::error(format!("command failed: {e}")),
        }
    }
}

pub struct ListSessionsTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> ListSessionsTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for ListSessionsTool<C> {
    fn name(&self) -> &str {
        "list_sessions"
    }

    fn description(&self) -> &str {
        "List background command sessions started with run_command(background=true), \
         with their status (running/completed/failed/timed out)."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value) -> ToolResult {
        let terminal = self.ctx.terminal().lock().await;
        let jobs = terminal.job_list();
        if jobs.is_empty() {
            return ToolResult::success("No background sessions.");
        }
        let lines: Vec<String> = jobs
            .iter()
            .map(|j| format!("{} [{:?}] {}", j.id, j.status, j.command))
            .collect();
        ToolResult::success(lines.join("\n"))
    }
}

pub struct GetSessionLogTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> GetSessionLogTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for GetSessionLogTool<C> {
    fn name(&self) -> &str {
        "get_session_log"
    }

    fn description(&self) -> &str {
        "Get the captured stdout/stderr and status for a background session \
         started with run_command(background=true)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": { "type": "string", "description": "Session id returned by run_command." }
            },
            "required": ["session_id"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let id = match input.get("session_id").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return ToolResult::error("'session_id' is required"),
        };
        let job_id = JobId::from(id);

        let terminal = self.ctx.terminal().lock().await;
        match terminal.job_status(&job_id) {
            Ok(job) => {
                let body = match &job.result {
                    Some(r) => format!(
                        "status: {:?}\nexit code: {}\nstdout:\n{}\nstderr:\n{}",
                        job.status, r.exit_code, r.stdout, r.stderr
                    ),
                    None => format!("status: {:?} (still running, no output captured yet)", job.status),
                };
                ToolResult::success(body)
            }
            Err(e) => ToolResult::error(format!("{e}")),
        }
    }
}

pub struct KillSessionTool<C: MessageContext + 'static> {
    ctx: Arc<C>,
}

impl<C: MessageContext + 'static> KillSessionTool<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl<C: MessageContext + 'static> Tool for KillSessionTool<C> {
    fn name(&self) -> &str {
        "kill_session"
    }

    fn description(&self) -> &str {
        "Stop a running background session started with run_command(background=true)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": { "type": "string", "description": "Session id returned by run_command." }
            },
            "required": ["session_id"]
        })
    }

    async fn execute(&self, input: Value) -> ToolResult {
        let id = match input.get("session_id").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return ToolResult::error("'session_id' is required"),
        };
        let job_id = JobId::from(id);

        let mut terminal = self.ctx.terminal().lock().await;
        match terminal.job_kill(&job_id) {
            Ok(()) => ToolResult::success(format!("Session {id} stopped")),
            Err(e) => ToolResult::error(format!("{e}")),
        }
    }
}
