//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Turns text commands into conversation events
//! - `callback_handler`: Turns inline keyboard clicks into conversation events
//! - `router`: Serializes events per chat and drives the conversation
//! - `actions`: The work bound to each conversation binding
//! - `notifier`: Outbound messages and broadcasts
//! - `ui_builder`: Creates keyboards and formats messages

pub mod actions;
pub mod callback_handler;
pub mod message_handler;
pub mod notifier;
pub mod router;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use actions::{ActionContext, ActionDispatcher, LogSource};
pub use notifier::{broadcast_images, broadcast_text, Notifier, TelegramNotifier};
pub use router::{IncomingEvent, RouteOutcome, Router};
