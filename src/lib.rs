//! # Facewatch Telegram Bot
//!
//! A Telegram bot that lets authorized chats trigger and configure a bounded
//! face scan of a video feed, through a nested menu of inline buttons driven
//! by a hierarchical conversation state machine.

pub mod bot;
pub mod config;
pub mod conversation;
pub mod db;
pub mod errors;
pub mod localization;
pub mod logging;
pub mod scan;
pub mod session;
pub mod settings;
pub mod video;
pub mod watcher;
