//! Chat sessions and the store that keeps them between events.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use teloxide::types::ChatId;
use tokio::sync::RwLock;

use crate::conversation::{ConversationTree, Frame, StateId};
use crate::errors::StoreError;

/// Largest gap below the last applied update id still treated as a redelivery
pub const REDELIVERY_ID_WINDOW: u32 = 1000;
/// Telegram keeps unconfirmed updates for 24 hours
pub const REDELIVERY_HOURS: i64 = 24;

/// Conversation state of one chat
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub chat_id: ChatId,
    /// Logged in through /start
    pub is_active: bool,
    /// Active level path, root first
    pub path: Vec<Frame>,
    /// Id of the last update applied to this session
    pub last_update_id: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Session created on first contact
    pub fn new(chat_id: ChatId, tree: &ConversationTree) -> Self {
        Self {
            chat_id,
            is_active: false,
            path: tree.initial_path(),
            last_update_id: None,
            updated_at: Utc::now(),
        }
    }

    /// State of the deepest active level
    pub fn state(&self) -> StateId {
        self.path
            .last()
            .map(|frame| frame.state)
            .unwrap_or(StateId::NotLogged)
    }

    /// Whether `update_id` was already applied.
    ///
    /// Telegram update ids grow, but restart from a random value after a week
    /// without updates. Only an id slightly behind the last applied one, on a
    /// session touched within the redelivery window, counts as a redelivery.
    pub fn is_duplicate(&self, update_id: u32) -> bool {
        self.is_duplicate_at(update_id, Utc::now())
    }

    fn is_duplicate_at(&self, update_id: u32, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_update_id else {
            return false;
        };
        update_id <= last
            && last - update_id < REDELIVERY_ID_WINDOW
            && now - self.updated_at < Duration::hours(REDELIVERY_HOURS)
    }
}

/// Persistence of sessions
///
/// The router is the only writer; actions never touch the store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn lookup(&self, chat_id: ChatId) -> Result<Option<Session>, StoreError>;
    async fn update(&self, session: &Session) -> Result<(), StoreError>;
    /// Chats whose session is logged in
    async fn active_chats(&self) -> Result<Vec<ChatId>, StoreError>;
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct InMemSessionStore {
    sessions: RwLock<HashMap<ChatId, Session>>,
}

impl InMemSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemSessionStore {
    async fn lookup(&self, chat_id: ChatId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(&chat_id).cloned())
    }

    async fn update(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.chat_id, session.clone());
        Ok(())
    }

    async fn active_chats(&self) -> Result<Vec<ChatId>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut chats: Vec<ChatId> = sessions
            .values()
            .filter(|session| session.is_active)
            .map(|session| session.chat_id)
            .collect();
        chats.sort_by_key(|chat| chat.0);
        Ok(chats)
    }
}
