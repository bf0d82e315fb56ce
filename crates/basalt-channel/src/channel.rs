use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::ChannelError,
    types::{ChannelStatus, ChatId, DownloadedFile, InboundEvent},
};

/// Common interface implemented by every channel adapter (Telegram, Discord, WebChat, …).
///
/// Implementations must be `Send + Sync` so they can be stored in a
/// [`ChannelManager`](crate::manager::ChannelManager) and driven from
/// multiple Tokio tasks. Sending is `&self` (shared reference) so a
/// connected adapter can send concurrently without a mutable borrow.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"telegram"`).
    fn name(&self) -> &str;

    /// Establish the connection to the external service and start
    /// delivering inbound events to the receiver returned by `subscribe`.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    /// Gracefully close the connection.
    async fn disconnect(&mut self) -> Result<(), ChannelError>;

    /// Send `text` to `chat_id`, returning the platform's message id so it
    /// can later be edited or deleted.
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<String, ChannelError>;

    /// Replace the content of a previously sent message.
    async fn edit_message(
        &self,
        chat_id: &ChatId,
        message_id: &str,
        text: &str,
    ) -> Result<(), ChannelError>;

    /// Remove a previously sent message.
    async fn delete_message(&self, chat_id: &ChatId, message_id: &str) -> Result<(), ChannelError>;

    /// Signal to the user that a response is being composed.
    async fn send_typing(&self, chat_id: &ChatId) -> Result<(), ChannelError>;

    /// Download a channel-hosted file (attachment, voice note, photo, …).
    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile, ChannelError>;

    /// Return the receiving end of this adapter's inbound event stream.
    ///
    /// Callable once per adapter instance; the sending half is owned by the
    /// background task spawned in `connect`.
    fn subscribe(&mut self) -> mpsc::Receiver<InboundEvent>;

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}
