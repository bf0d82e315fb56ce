//! Outbound Channel abstraction: one trait every chat surface implements
//! (`send_message`/`edit_message`/`delete_message`/`send_typing`/
//! `download_file`/`subscribe`), ingress middleware (allow-list,
//! per-chat rate limiting, message splitting) shared by every adapter, and
//! one concrete adapter (Telegram).

pub mod allowlist;
pub mod channel;
pub mod error;
pub mod manager;
pub mod ratelimit;
pub mod splitting;
pub mod telegram;
pub mod types;

pub use channel::OutboundChannel;
pub use error::ChannelError;
pub use manager::ChannelManager;
pub use ratelimit::RateLimiter;
pub use types::{ChannelStatus, ChatId, DownloadedFile, InboundEvent, InboundKind};
