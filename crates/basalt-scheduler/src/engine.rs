use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    schedule::compute_next_run,
    types::{Job, JobPayload, JobStatus, Schedule},
};

type JobRow = (
    String,         // id
    String,         // chat_id
    String,         // name
    String,         // schedule JSON
    String,         // timezone
    String,         // payload JSON
    String,         // status
    Option<String>, // last_run
    Option<String>, // next_run
    u32,            // run_count
    Option<u32>,    // max_runs
    String,         // created_at
    String,         // updated_at
);

fn row_to_job(row: JobRow) -> Option<Job> {
    let (
        id,
        chat_id,
        name,
        sched_json,
        timezone,
        payload_json,
        status_str,
        last_run,
        next_run,
        run_count,
        max_runs,
        created_at,
        updated_at,
    ) = row;
    let schedule: Schedule = serde_json::from_str(&sched_json).ok()?;
    let payload: JobPayload = serde_json::from_str(&payload_json).ok()?;
    let status: JobStatus = status_str.parse().ok()?;
    Some(Job {
        id,
        chat_id,
        name,
        schedule,
        timezone,
        payload,
        status,
        last_run,
        next_run,
        run_count,
        max_runs,
        created_at,
        updated_at,
    })
}

const SELECT_COLUMNS: &str = "id, chat_id, name, schedule, timezone, payload, status, \
     last_run, next_run, run_count, max_runs, created_at, updated_at";

/// Shared handle for job management (list/add/remove) while the engine loop runs.
///
/// Uses its own `Connection` so handlers can manage jobs without conflicting
/// with the engine's polling queries.
pub struct SchedulerHandle {
    conn: Arc<Mutex<Connection>>,
}

impl SchedulerHandle {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn add_job(
        &self,
        chat_id: &str,
        name: &str,
        schedule: Schedule,
        timezone: &str,
        payload: JobPayload,
    ) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next = compute_next_run(&schedule, now, timezone).map(|dt| dt.to_rfc3339());
        let id = Uuid::new_v4().to_string();
        let schedule_json = serde_json::to_string(&schedule)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
        let payload_json = serde_json::to_string(&payload)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

        conn.execute(
            "INSERT INTO jobs
             (id, chat_id, name, schedule, timezone, payload, status, last_run, next_run,
              run_count, max_runs, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,'pending',NULL,?7,0,NULL,?8,?8)",
            rusqlite::params![id, chat_id, name, schedule_json, timezone, payload_json, next, now_str],
        )?;
        info!(job_id = %id, %name, %chat_id, "job added via handle");
        Ok(Job {
            id,
            chat_id: chat_id.to_string(),
            name: name.to_string(),
            schedule,
            timezone: timezone.to_string(),
            payload,
            status: JobStatus::Pending,
            last_run: None,
            next_run: next,
            run_count: 0,
            max_runs: None,
            created_at: now_str.clone(),
            updated_at: now_str,
        })
    }

    pub fn remove_job(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        info!(job_id = %id, "job removed via handle");
        Ok(())
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs ORDER BY created_at"
        ))?;
        let jobs = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, u32>(9)?,
                    row.get::<_, Option<u32>>(10)?,
                    row.get::<_, String>(11)?,
                    row.get::<_, String>(12)?,
                ))
            })?
            .filter_map(|r| row_to_job(r.ok()?))
            .collect();
        Ok(jobs)
    }

    /// Pause or resume a job (spec §3: "a disabled job has next_run_at = nil").
    ///
    /// Pausing clears `next_run` so the job drops out of `tick()`'s polling
    /// query entirely. Resuming recomputes `next_run` from the job's own
    /// schedule rather than reusing whatever was stored before the pause,
    /// which would otherwise be stale or `NULL`.
    pub fn set_paused(&self, id: &str, paused: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        if paused {
            let n = conn.execute(
                "UPDATE jobs SET status = 'paused', next_run = NULL, updated_at = ?1
                 WHERE id = ?2 AND status IN ('pending', 'paused')",
                rusqlite::params![now_str, id],
            )?;
            if n == 0 {
                return Err(SchedulerError::JobNotFound { id: id.to_string() });
            }
            info!(job_id = %id, "job paused");
            return Ok(());
        }

        let (sched_json, timezone): (String, String) = conn
            .query_row(
                "SELECT schedule, timezone FROM jobs WHERE id = ?1 AND status IN ('pending', 'paused')",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|_| SchedulerError::JobNotFound { id: id.to_string() })?;
        let schedule: Schedule = serde_json::from_str(&sched_json)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
        let next = compute_next_run(&schedule, now, &timezone).map(|dt| dt.to_rfc3339());

        conn.execute(
            "UPDATE jobs SET status = 'pending', next_run = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![next, now_str, id],
        )?;
        info!(job_id = %id, "job resumed");
        Ok(())
    }

    /// Force a job to become due on the next tick, regardless of its schedule.
    pub fn trigger_now(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let n = conn.execute(
            "UPDATE jobs SET status = 'pending', next_run = ?1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now, id],
        )?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        info!(job_id = %id, "job triggered for immediate run");
        Ok(())
    }
}

/// Core scheduler: persists jobs to SQLite and drives execution at ±1 s precision.
pub struct SchedulerEngine {
    conn: Connection,
    /// If set, fired jobs are sent here for delivery routing.
    fired_tx: Option<mpsc::Sender<Job>>,
}

impl SchedulerEngine {
    /// Create a new engine, initialising the DB schema if needed.
    ///
    /// Pass `Some(tx)` to receive a copy of every fired [`Job`] via mpsc.
    /// The sender is non-blocking (`try_send`) so the tick loop is never stalled.
    pub fn new(conn: Connection, fired_tx: Option<mpsc::Sender<Job>>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn, fired_tx })
    }

    /// Add a new job. Returns the fully populated [`Job`] record.
    pub fn add_job(
        &self,
        chat_id: &str,
        name: &str,
        schedule: Schedule,
        timezone: &str,
        payload: JobPayload,
    ) -> Result<Job> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next = compute_next_run(&schedule, now, timezone).map(|dt| dt.to_rfc3339());
        let id = Uuid::new_v4().to_string();
        let schedule_json = serde_json::to_string(&schedule)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
        let payload_json = serde_json::to_string(&payload)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO jobs
             (id, chat_id, name, schedule, timezone, payload, status, last_run, next_run,
              run_count, max_runs, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,'pending',NULL,?7,0,NULL,?8,?8)",
            rusqlite::params![id, chat_id, name, schedule_json, timezone, payload_json, next, now_str],
        )?;

        info!(job_id = %id, %name, %chat_id, "job added");

        Ok(Job {
            id,
            chat_id: chat_id.to_string(),
            name: name.to_string(),
            schedule,
            timezone: timezone.to_string(),
            payload,
            status: JobStatus::Pending,
            last_run: None,
            next_run: next,
            run_count: 0,
            max_runs: None,
            created_at: now_str.clone(),
            updated_at: now_str,
        })
    }

    /// Remove a job by ID. Returns `JobNotFound` if no row is deleted.
    pub fn remove_job(&self, id: &str) -> Result<()> {
        let n = self.conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        info!(job_id = %id, "job removed");
        Ok(())
    }

    /// Return all known jobs ordered by creation time.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM jobs ORDER BY created_at"))?;

        let jobs = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, u32>(9)?,
                    row.get::<_, Option<u32>>(10)?,
                    row.get::<_, String>(11)?,
                    row.get::<_, String>(12)?,
                ))
            })?
            .filter_map(|r| row_to_job(r.ok()?))
            .collect();

        Ok(jobs)
    }

    /// Main event loop. Polls every second until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        self.warn_on_overdue_startup();

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    // --- private helpers ---------------------------------------------------

    /// Log how many pending jobs missed their window while the engine was
    /// offline. Diagnostic only — does not touch job status. `tick()`'s
    /// `next_run <= now` query already picks these jobs up on the very next
    /// poll and re-derives `next_run` from the current time, so a job fires
    /// exactly once on wake instead of being permanently excluded (spec §8's
    /// missed-tick non-replay property).
    fn warn_on_overdue_startup(&self) {
        let now = Utc::now().to_rfc3339();
        match self.conn.query_row(
            "SELECT COUNT(*) FROM jobs
             WHERE status = 'pending' AND next_run IS NOT NULL AND next_run < ?1",
            [&now],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(n) if n > 0 => warn!(count = n, "jobs overdue at startup — will fire once on next tick"),
            Err(e) => error!("overdue-at-startup query failed: {e}"),
            _ => {}
        }
    }

    /// Process all jobs whose next_run has arrived.
    fn tick(&mut self) -> Result<()> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        // Collect eagerly inside the block so `stmt` is dropped before we
        // borrow `self.conn` again for the UPDATE below.
        let due: Vec<(String, String, String, String, String, String, u32, Option<u32>)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id, chat_id, name, schedule, timezone, payload, run_count, max_runs FROM jobs
                 WHERE status = 'pending' AND next_run IS NOT NULL AND next_run <= ?1",
            )?;
            let rows: Vec<_> = stmt
                .query_map([&now_str], |row| {
                    Ok((
                        row.get::<_, String>(0)?,      // id
                        row.get::<_, String>(1)?,      // chat_id
                        row.get::<_, String>(2)?,      // name
                        row.get::<_, String>(3)?,      // schedule JSON
                        row.get::<_, String>(4)?,      // timezone
                        row.get::<_, String>(5)?,      // payload JSON
                        row.get::<_, u32>(6)?,         // run_count
                        row.get::<_, Option<u32>>(7)?, // max_runs
                    ))
                })?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        for (id, chat_id, name, sched_json, timezone, payload_json, run_count, max_runs) in due {
            let schedule: Schedule = match serde_json::from_str(&sched_json) {
                Ok(s) => s,
                Err(e) => {
                    error!(job_id = %id, "bad schedule JSON: {e}");
                    continue;
                }
            };
            let payload: JobPayload = match serde_json::from_str(&payload_json) {
                Ok(p) => p,
                Err(e) => {
                    error!(job_id = %id, "bad payload JSON: {e}");
                    continue;
                }
            };

            let new_count = run_count + 1;
            // next is None when the schedule is exhausted (Once after first fire,
            // or max_runs reached). In both cases mark the job completed.
            let next = if max_runs.is_some_and(|m| new_count >= m) {
                None
            } else {
                compute_next_run(&schedule, now, &timezone).map(|dt| dt.to_rfc3339())
            };
            // Completed when there is no future run; pending when there is a next_run.
            let new_status = if next.is_none() {
                "completed"
            } else {
                "pending"
            };

            info!(job_id = %id, %name, %chat_id, run = new_count, next_status = %new_status, "executing job");

            self.conn.execute(
                "UPDATE jobs SET status=?1, last_run=?2, next_run=?3,
                  run_count=?4, updated_at=?2
                 WHERE id=?5",
                rusqlite::params![new_status, now_str, next, new_count, id],
            )?;

            // Forward the fired job to the delivery router (non-blocking).
            if let Some(ref tx) = self.fired_tx {
                let job = Job {
                    id: id.clone(),
                    chat_id: chat_id.clone(),
                    name: name.clone(),
                    schedule,
                    timezone: timezone.clone(),
                    payload,
                    status: JobStatus::Pending,
                    last_run: Some(now_str.clone()),
                    next_run: next.clone(),
                    run_count: new_count,
                    max_runs,
                    created_at: String::new(),
                    updated_at: now_str.clone(),
                };
                // try_send never blocks the tick loop; log a warning if the channel is full.
                if tx.try_send(job).is_err() {
                    warn!(job_id = %id, "delivery channel full or closed — job dropped");
                }
            }
        }
        Ok(())
    }
}
