//! Outbound messages: the transport seam used by actions and the watcher

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile};
use tracing::{debug, error};

use crate::session::SessionStore;

/// Sends messages and images to chats
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn send_image(
        &self,
        chat_id: ChatId,
        png: Vec<u8>,
        caption: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;
}

/// Telegram implementation of [`Notifier`]
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let request = self.bot.send_message(chat_id, text);
        match keyboard {
            Some(keyboard) => request.reply_markup(keyboard).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn send_image(
        &self,
        chat_id: ChatId,
        png: Vec<u8>,
        caption: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut request = self
            .bot
            .send_photo(chat_id, InputFile::memory(png).file_name("frame.png"));
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        request.await?;
        Ok(())
    }
}

/// Send `text` to every logged-in chat, returning how many chats received it.
/// Failures are logged per chat and do not stop the broadcast.
pub async fn broadcast_text(
    notifier: &dyn Notifier,
    sessions: &dyn SessionStore,
    text: &str,
) -> Result<usize> {
    let chats = sessions.active_chats().await?;
    let mut delivered = 0;
    for chat_id in chats {
        match notifier.send_text(chat_id, text.to_string(), None).await {
            Ok(()) => delivered += 1,
            Err(e) => error!(chat_id = %chat_id, error = %e, "Failed to broadcast message"),
        }
    }
    debug!(delivered, "Broadcast message sent");
    Ok(delivered)
}

/// Send each image to every logged-in chat, returning how many chats received all of them
pub async fn broadcast_images(
    notifier: &dyn Notifier,
    sessions: &dyn SessionStore,
    images: &[Vec<u8>],
    caption: Option<&str>,
) -> Result<usize> {
    let chats = sessions.active_chats().await?;
    let mut delivered = 0;
    for chat_id in chats {
        let mut complete = true;
        for png in images {
            if let Err(e) = notifier
                .send_image(chat_id, png.clone(), caption.map(str::to_string), None)
                .await
            {
                error!(chat_id = %chat_id, error = %e, "Failed to broadcast image");
                complete = false;
                break;
            }
        }
        if complete {
            delivered += 1;
        }
    }
    debug!(delivered, images = images.len(), "Broadcast images sent");
    Ok(delivered)
}
