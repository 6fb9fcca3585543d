//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, warn};

use crate::conversation::classify_callback;

use super::router::{IncomingEvent, Router};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    update: Update,
    router: Arc<Router>,
) -> Result<()> {
    debug!(user_id = %q.from.id, "Received callback query from user");

    // Answer right away so the button stops spinning while a scan runs
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));

    let event = IncomingEvent::new(chat_id, classify_callback(data))
        .with_update_id(update.id.0)
        .with_language(q.from.language_code.clone());

    let outcome = router.route(event).await?;
    debug!(chat_id = %chat_id, outcome = ?outcome, "Callback routed");
    Ok(())
}
