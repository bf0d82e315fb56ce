//! Telegram adapter: the one concrete [`OutboundChannel`] implementation.
//!
//! Wraps a teloxide `Bot` and drives its long-polling `Dispatcher` in a
//! background task until `disconnect` aborts it. The allow-list and rate
//! limiter run inside the dispatcher's handler, before a message is ever
//! forwarded onto the `subscribe()` channel — ingress filtering, not
//! pipeline filtering.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    allowlist,
    channel::OutboundChannel,
    error::ChannelError,
    ratelimit::RateLimiter,
    types::{budgets, ChannelStatus, ChatId, DownloadedFile, InboundEvent, InboundKind},
};

/// Channel-name constant used as this adapter's [`OutboundChannel::name`].
pub const NAME: &str = "telegram";

/// Telegram long-polling adapter.
pub struct TelegramChannel {
    bot_token: String,
    allow_list: Vec<String>,
    rate_limiter: Arc<RateLimiter>,
    bot: Option<Bot>,
    inbound_tx: Option<mpsc::Sender<InboundEvent>>,
    dispatcher: Option<JoinHandle<()>>,
    status: Arc<Mutex<ChannelStatus>>,
}

impl TelegramChannel {
    pub fn new(bot_token: String, allow_list: Vec<String>) -> Self {
        Self {
            bot_token,
            allow_list,
            rate_limiter: Arc::new(RateLimiter::default()),
            bot: None,
            inbound_tx: None,
            dispatcher: None,
            status: Arc::new(Mutex::new(ChannelStatus::Disconnected)),
        }
    }

    fn bot(&self) -> Result<&Bot, ChannelError> {
        self.bot
            .as_ref()
            .ok_or_else(|| ChannelError::ConnectionFailed("telegram: not connected".into()))
    }

    fn parse_chat_id(chat_id: &ChatId) -> Result<teloxide::types::ChatId, ChannelError> {
        chat_id
            .as_str()
            .parse::<i64>()
            .map(teloxide::types::ChatId)
            .map_err(|e| ChannelError::ConfigError(format!("invalid telegram chat id: {e}")))
    }
}

#[async_trait]
impl OutboundChannel for TelegramChannel {
    fn name(&self) -> &str {
        NAME
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.bot_token.trim().is_empty() {
            return Err(ChannelError::ConfigError("no telegram bot token configured".into()));
        }
        let tx = self
            .inbound_tx
            .clone()
            .ok_or_else(|| ChannelError::ConfigError("subscribe() must be called before connect()".into()))?;

        let bot = Bot::new(&self.bot_token);
        self.bot = Some(bot.clone());

        let allow_list = Arc::new(self.allow_list.clone());
        let rate_limiter = Arc::clone(&self.rate_limiter);
        let status = Arc::clone(&self.status);

        *status.lock().unwrap() = ChannelStatus::Connecting;

        let handler = Update::filter_message().endpoint(handle_update);
        let handle = tokio::spawn(async move {
            Dispatcher::builder(bot, handler)
                .dependencies(dptree::deps![tx, allow_list, rate_limiter])
                .default_handler(|_upd| async {})
                .build()
                .dispatch()
                .await;
        });

        self.dispatcher = Some(handle);
        *self.status.lock().unwrap() = ChannelStatus::Connected;
        info!("telegram: long-polling dispatcher started");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        if let Some(handle) = self.dispatcher.take() {
            handle.abort();
        }
        self.bot = None;
        *self.status.lock().unwrap() = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<String, ChannelError> {
        let tg_chat_id = Self::parse_chat_id(chat_id)?;
        let msg = self
            .bot()?
            .send_message(tg_chat_id, text)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(msg.id.0.to_string())
    }

    async fn edit_message(
        &self,
        chat_id: &ChatId,
        message_id: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        let tg_chat_id = Self::parse_chat_id(chat_id)?;
        let msg_id = parse_message_id(message_id)?;
        self.bot()?
            .edit_message_text(tg_chat_id, msg_id, text)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: &ChatId, message_id: &str) -> Result<(), ChannelError> {
        let tg_chat_id = Self::parse_chat_id(chat_id)?;
        let msg_id = parse_message_id(message_id)?;
        self.bot()?
            .delete_message(tg_chat_id, msg_id)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: &ChatId) -> Result<(), ChannelError> {
        let tg_chat_id = Self::parse_chat_id(chat_id)?;
        self.bot()?
            .send_chat_action(tg_chat_id, ChatAction::Typing)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile, ChannelError> {
        let bot = self.bot()?;
        let file = bot
            .get_file(file_id)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        let mut buf = Vec::new();
        bot.download_file(&file.path, &mut buf)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(DownloadedFile {
            bytes: buf,
            mime_type: None,
        })
    }

    fn subscribe(&mut self) -> mpsc::Receiver<InboundEvent> {
        let (tx, rx) = mpsc::channel(256);
        self.inbound_tx = Some(tx);
        rx
    }

    fn status(&self) -> ChannelStatus {
        self.status.lock().unwrap().clone()
    }
}

/// Download the highest-resolution photo attached to `msg`, base64-encode it,
/// and return it capped at `budgets::MAX_IMAGE_SIZE`. Returns `None` for
/// text-only messages, oversized photos, or on any download error.
async fn download_largest_photo(bot: &Bot, msg: &Message) -> Option<String> {
    let photo = msg.photo()?.last()?;
    if u64::from(photo.file.size) > budgets::MAX_IMAGE_SIZE as u64 {
        warn!(size = photo.file.size, "telegram: photo exceeds size limit, skipping");
        return None;
    }

    let file = match bot.get_file(&photo.file.id).await {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "telegram: get_file failed");
            return None;
        }
    };

    let mut buf = Vec::new();
    if let Err(e) = bot.download_file(&file.path, &mut buf).await {
        warn!(error = %e, "telegram: download_file failed");
        return None;
    }

    Some(base64::engine::general_purpose::STANDARD.encode(&buf))
}

fn parse_message_id(message_id: &str) -> Result<teloxide::types::MessageId, ChannelError> {
    message_id
        .parse::<i32>()
        .map(teloxide::types::MessageId)
        .map_err(|e| ChannelError::ConfigError(format!("invalid telegram message id: {e}")))
}

/// Dispatcher endpoint: allow-list, then rate-limit, then forward as an
/// [`InboundEvent`]. Runs once per incoming Telegram `Message`.
async fn handle_update(
    bot: Bot,
    msg: Message,
    tx: mpsc::Sender<InboundEvent>,
    allow_list: Arc<Vec<String>>,
    rate_limiter: Arc<RateLimiter>,
) -> ResponseResult<()> {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    let chat_id = ChatId::from(msg.chat.id.0);

    if !allowlist::is_allowed(&allow_list, &chat_id) {
        return Ok(());
    }
    if !rate_limiter.check(&chat_id, chrono::Utc::now()) {
        warn!(chat_id = %chat_id, "telegram: rate limit exceeded, dropping message");
        return Ok(());
    }

    let text = msg.text().map(str::to_string);
    let caption = msg.caption().map(str::to_string);
    let image_blob = download_largest_photo(&bot, &msg).await;

    if text.is_none() && caption.is_none() && image_blob.is_none() {
        return Ok(());
    }

    let event = InboundEvent {
        chat_id,
        user_id: from.id.0.to_string(),
        kind: if image_blob.is_some() { InboundKind::Image } else { InboundKind::Text },
        text,
        caption,
        image_blob,
    };

    if tx.send(event).await.is_err() {
        warn!("telegram: inbound channel closed, dropping message");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_id_rejects_non_numeric() {
        let err = TelegramChannel::parse_chat_id(&ChatId::from("not-a-number")).unwrap_err();
        assert!(matches!(err, ChannelError::ConfigError(_)));
    }

    #[test]
    fn parse_chat_id_accepts_negative_group_ids() {
        let parsed = TelegramChannel::parse_chat_id(&ChatId::from("-100123456789")).unwrap();
        assert_eq!(parsed.0, -100123456789);
    }

    #[test]
    fn parse_message_id_rejects_non_numeric() {
        assert!(parse_message_id("abc").is_err());
    }

    #[test]
    fn initial_status_is_disconnected() {
        let channel = TelegramChannel::new("token".to_string(), vec!["*".to_string()]);
        assert_eq!(channel.status(), ChannelStatus::Disconnected);
    }
}
