//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::Me;
use tracing::debug;

use crate::conversation::classify_text;

use super::router::{IncomingEvent, Router};

/// Handle text messages: commands are routed, anything else is ignored
pub async fn message_handler(
    msg: Message,
    update: Update,
    me: Me,
    router: Arc<Router>,
) -> Result<()> {
    let Some(text) = msg.text() else {
        debug!(chat_id = %msg.chat.id, "Ignoring non-text message");
        return Ok(());
    };

    let Some(tag) = classify_text(text, me.username()) else {
        debug!(chat_id = %msg.chat.id, "Ignoring unrecognized text");
        return Ok(());
    };

    // Extract user's language code from Telegram
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.clone());

    let event = IncomingEvent::new(msg.chat.id, tag)
        .with_update_id(update.id.0)
        .with_language(language_code);

    let outcome = router.route(event).await?;
    debug!(chat_id = %msg.chat.id, outcome = ?outcome, "Message routed");
    Ok(())
}
