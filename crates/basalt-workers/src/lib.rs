//! Background workers (§4.6): heartbeat checks, the daily briefing, and
//! sub-agent delegation. `registry::WorkerHandle` is the concrete
//! implementation of `basalt_agent::pipeline::WorkerRegistry`, the seam
//! tools and the gateway use to reach this subsystem.

pub mod briefing;
pub mod error;
pub mod heartbeat;
pub mod registry;
pub mod store;
pub mod subagent;
pub mod types;

pub use error::{Result, WorkerError};
pub use registry::WorkerHandle;
pub use types::{BriefingConfig, HeartbeatConfig};
