//! `basalt-scheduler` — Tokio-based job scheduler with SQLite persistence.
//!
//! # Overview
//!
//! Jobs are persisted to a SQLite `jobs` table. The [`engine::SchedulerEngine`]
//! polls the database every second and executes any job whose `next_run` has
//! arrived, updating state and computing the next scheduled time.
//!
//! # Schedule variants
//!
//! | Variant    | Behaviour                                          |
//! |------------|----------------------------------------------------|
//! | `Once`     | Single fire at an absolute UTC instant             |
//! | `Interval` | Repeat every N seconds                             |
//! | `Daily`    | Fire at HH:MM in the job's timezone every day      |
//! | `Weekly`   | Fire at HH:MM in the job's timezone on a weekday   |
//! | `Cron`     | Standard 5-field cron expression                   |
//!
//! Each job carries an IANA `timezone` (default `UTC`) that `Daily`/`Weekly`/
//! `Cron` are evaluated against, and a [`types::JobPayload`] describing what
//! happens when it fires: a canned `SystemEvent`, or an `AgentTurn` message
//! fed into the agent pipeline.

pub mod db;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use types::{Job, JobPayload, JobStatus, Schedule};
