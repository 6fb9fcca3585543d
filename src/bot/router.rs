//! Event router: serializes events per chat and drives the conversation.
//!
//! Each event takes its chat's lock, loads the session, resolves the binding,
//! runs the action, applies the transition and stores the session. Locks are
//! per chat, so a slow scan in one chat never blocks another, while a second
//! event from the same chat (an exit pressed mid-scan) waits its turn.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::conversation::{build_conversation, Action, ConversationTree, EventTag, StateId};
use crate::session::{Session, SessionStore};

use super::actions::{ActionContext, ActionDispatcher};

/// A classified event addressed to one chat
#[derive(Clone, Debug)]
pub struct IncomingEvent {
    pub chat_id: ChatId,
    /// Transport delivery id, used to drop redeliveries
    pub update_id: Option<u32>,
    pub tag: EventTag,
    pub language_code: Option<String>,
}

impl IncomingEvent {
    pub fn new(chat_id: ChatId, tag: EventTag) -> Self {
        Self {
            chat_id,
            update_id: None,
            tag,
            language_code: None,
        }
    }

    pub fn with_update_id(mut self, update_id: u32) -> Self {
        self.update_id = Some(update_id);
        self
    }

    pub fn with_language(mut self, language_code: Option<String>) -> Self {
        self.language_code = language_code;
        self
    }
}

/// What the router did with an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// An action ran; `state` is the session state afterwards
    Handled { action: Action, state: StateId },
    /// No binding matched, the event was dropped
    Unhandled { state: StateId },
    /// The update was already applied
    Duplicate { state: StateId },
}

impl RouteOutcome {
    pub fn state(&self) -> StateId {
        match self {
            RouteOutcome::Handled { state, .. }
            | RouteOutcome::Unhandled { state }
            | RouteOutcome::Duplicate { state } => *state,
        }
    }
}

pub struct Router {
    tree: ConversationTree,
    sessions: Arc<dyn SessionStore>,
    actions: ActionDispatcher,
    chat_locks: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl Router {
    pub fn new(sessions: Arc<dyn SessionStore>, actions: ActionDispatcher) -> Self {
        Self::with_tree(build_conversation(), sessions, actions)
    }

    pub fn with_tree(
        tree: ConversationTree,
        sessions: Arc<dyn SessionStore>,
        actions: ActionDispatcher,
    ) -> Self {
        Self {
            tree,
            sessions,
            actions,
            chat_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    async fn chat_lock(&self, chat_id: ChatId) -> Arc<Mutex<()>> {
        let mut locks = self.chat_locks.lock().await;
        Arc::clone(locks.entry(chat_id).or_default())
    }

    /// Drop the chat's lock entry once no other event holds or waits on it
    async fn release_chat_lock(&self, chat_id: ChatId, lock: Arc<Mutex<()>>) {
        let mut locks = self.chat_locks.lock().await;
        drop(lock);
        if locks
            .get(&chat_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&chat_id);
        }
    }

    /// Number of chats with an event in flight
    pub async fn locked_chats(&self) -> usize {
        self.chat_locks.lock().await.len()
    }

    /// Process one event for its chat
    pub async fn route(&self, event: IncomingEvent) -> Result<RouteOutcome> {
        let chat_id = event.chat_id;
        let lock = self.chat_lock(chat_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.route_serialized(event).await
        };
        self.release_chat_lock(chat_id, lock).await;
        outcome
    }

    async fn route_serialized(&self, event: IncomingEvent) -> Result<RouteOutcome> {
        let mut session = match self.sessions.lookup(event.chat_id).await? {
            Some(session) => session,
            None => {
                debug!(chat_id = %event.chat_id, "Creating session on first contact");
                Session::new(event.chat_id, &self.tree)
            }
        };

        if let Some(update_id) = event.update_id {
            if session.is_duplicate(update_id) {
                debug!(chat_id = %event.chat_id, update_id, "Dropping redelivered update");
                return Ok(RouteOutcome::Duplicate {
                    state: session.state(),
                });
            }
        }

        let Some(resolved) = self.tree.resolve(&session.path, session.is_active, &event.tag) else {
            debug!(
                chat_id = %event.chat_id,
                event = ?event.tag,
                state = ?session.state(),
                "No binding for event, dropping"
            );
            return Ok(RouteOutcome::Unhandled {
                state: session.state(),
            });
        };

        debug!(
            chat_id = %event.chat_id,
            level = self.tree.level(resolved.level).name(),
            depth = resolved.depth,
            action = resolved.action.name(),
            "Dispatching action"
        );

        let ctx = ActionContext {
            chat_id: event.chat_id,
            is_active: session.is_active,
            event: event.tag.clone(),
            language_code: event.language_code.clone(),
        };
        let transition = self.actions.dispatch(resolved.action, &ctx).await;

        let previous = session.state();
        if let Some(active) = transition.activate {
            session.is_active = active;
        }
        session.path = self.tree.apply(&resolved, session.is_active, transition.next);
        if event.update_id.is_some() {
            session.last_update_id = event.update_id;
        }
        session.updated_at = Utc::now();
        self.sessions.update(&session).await?;

        if previous != session.state() {
            info!(
                chat_id = %event.chat_id,
                from = ?previous,
                to = ?session.state(),
                action = resolved.action.name(),
                "Conversation state changed"
            );
        }

        Ok(RouteOutcome::Handled {
            action: resolved.action,
            state: session.state(),
        })
    }
}
