//! Channel-facing types. Inbound/outbound payloads and budgets live in
//! `basalt_core::types` so every crate (pipeline, scheduler, channel) agrees
//! on one wire shape; this module only adds the channel-lifecycle types
//! specific to running an adapter.

use serde::{Deserialize, Serialize};

pub use basalt_core::types::{budgets, ChannelOutbound, ChatId, InboundEvent, InboundKind};

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// An unrecoverable (or pre-retry) error occurred.
    Error(String),
}

/// Bytes downloaded from a channel-hosted file (a Telegram photo, a voice
/// note, …) via [`crate::channel::OutboundChannel::download_file`].
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}
