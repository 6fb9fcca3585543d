use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Me};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use facewatch::bot::{self, ActionDispatcher, Notifier, Router, TelegramNotifier};
use facewatch::config::AppConfig;
use facewatch::conversation::Command;
use facewatch::db::PgSessionStore;
use facewatch::logging::init_tracing;
use facewatch::session::{InMemSessionStore, SessionStore};
use facewatch::settings::SettingsStore;
use facewatch::video::{Scanner, VideoScanner};
use facewatch::watcher::Watcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::load_from_env()?;

    // Initialize logging
    init_tracing(&config.logging)?;

    info!("Starting Facewatch Telegram Bot");

    let sessions: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => {
            info!("Using PostgreSQL session store");
            Arc::new(PgSessionStore::connect(url).await?)
        }
        None => {
            warn!("DATABASE_URL not set, sessions are kept in memory");
            Arc::new(InMemSessionStore::new())
        }
    };

    // Initialize the bot
    let bot = Bot::new(config.telegram.token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone()));
    let scanner: Arc<dyn Scanner> = Arc::new(VideoScanner::new(
        config.analysis.frames_dir.clone(),
        config.analysis.fps,
    ));
    let settings = Arc::new(SettingsStore::new(config.analysis.initial_settings()));

    let actions = ActionDispatcher::from_config(
        &config,
        Arc::clone(&notifier),
        Arc::clone(&scanner),
        Arc::clone(&settings),
    );
    let router = Arc::new(Router::new(Arc::clone(&sessions), actions));

    let watcher = Watcher::new(scanner, settings, notifier, sessions);
    tokio::spawn(watcher.run(Duration::from_secs(config.analysis.watch_interval_secs.max(1))));

    info!(
        authorized_chats = config.telegram.authorized_chats.len(),
        "Bot initialized, starting dispatcher"
    );

    // Set up the dispatcher with the shared router
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let router = Arc::clone(&router);
            move |msg: Message, update: Update, me: Me| {
                let router = Arc::clone(&router);
                async move { bot::message_handler(msg, update, me, router).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let router = Arc::clone(&router);
            move |bot: Bot, q: CallbackQuery, update: Update| {
                let router = Arc::clone(&router);
                async move { bot::callback_handler(bot, q, update, router).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
