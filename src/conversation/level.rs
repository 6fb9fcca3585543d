//! Building blocks of the nested conversation: states, actions, bindings and levels.

use serde::{Deserialize, Serialize};

use super::event::{EventTag, Pattern};

/// Conversation state identifier
///
/// `End` is a pseudo-state meaning "leave the current level"; it is always
/// remapped or dropped and never stored in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateId {
    NotLogged,
    Logged,
    Settings,
    RespSettings,
    End,
}

/// Index of a level inside a [`ConversationTree`](super::ConversationTree)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelId(pub usize);

/// Logical actions a binding can invoke
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    ShowLoggedMenu,
    ShowSnapshot,
    ShowSettings,
    Toggle,
    GetLog,
    FaceNumber,
    SecondsToAnalyze,
    FramePercentage,
    SettingResp,
    SnapshotResp,
    Exit,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::ShowLoggedMenu => "show_logged_menu",
            Action::ShowSnapshot => "show_snapshot",
            Action::ShowSettings => "show_settings",
            Action::Toggle => "toggle",
            Action::GetLog => "get_log",
            Action::FaceNumber => "face_number",
            Action::SecondsToAnalyze => "seconds_to_analyze",
            Action::FramePercentage => "frame_percentage",
            Action::SettingResp => "setting_resp",
            Action::SnapshotResp => "snapshot_resp",
            Action::Exit => "exit",
        }
    }
}

/// Transition reported by an action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// `None` keeps the current state
    pub next: Option<StateId>,
    /// New value of the session's `is_active` flag, `None` keeps it.
    /// Only `start` reports one; closing the menus keeps the chat logged in.
    pub activate: Option<bool>,
}

impl Transition {
    pub fn stay() -> Self {
        Self {
            next: None,
            activate: None,
        }
    }

    pub fn to(state: StateId) -> Self {
        Self {
            next: Some(state),
            activate: None,
        }
    }

    pub fn end() -> Self {
        Self::to(StateId::End)
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.activate = Some(active);
        self
    }
}

/// A (pattern, action) pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub pattern: Pattern,
    pub action: Action,
}

impl Binding {
    pub fn matches(&self, event: &EventTag) -> bool {
        self.pattern.matches(event)
    }
}

/// An entry of a level's state table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Bind(Binding),
    /// A nested level, tried through its entry points while not active
    Child(LevelId),
}

impl Entry {
    pub fn bind(pattern: Pattern, action: Action) -> Self {
        Entry::Bind(Binding { pattern, action })
    }
}

/// Authorization gate: `guarded` requires an active session, inactive
/// sessions are treated as resting on `redirect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gate {
    pub guarded: StateId,
    pub redirect: StateId,
}

/// One self-contained layer of the conversation
#[derive(Clone, Debug)]
pub struct Level {
    name: &'static str,
    entry_points: Vec<Binding>,
    states: Vec<(StateId, Vec<Entry>)>,
    fallbacks: Vec<Binding>,
    remap: Vec<(StateId, StateId)>,
    gate: Option<Gate>,
}

impl Level {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry_points: Vec::new(),
            states: Vec::new(),
            fallbacks: Vec::new(),
            remap: Vec::new(),
            gate: None,
        }
    }

    pub fn entry(mut self, pattern: Pattern, action: Action) -> Self {
        self.entry_points.push(Binding { pattern, action });
        self
    }

    pub fn state(mut self, state: StateId, entries: Vec<Entry>) -> Self {
        self.states.push((state, entries));
        self
    }

    pub fn fallback(mut self, pattern: Pattern, action: Action) -> Self {
        self.fallbacks.push(Binding { pattern, action });
        self
    }

    pub fn map_to_parent(mut self, from: StateId, to: StateId) -> Self {
        self.remap.push((from, to));
        self
    }

    pub fn gate(mut self, guarded: StateId, redirect: StateId) -> Self {
        self.gate = Some(Gate { guarded, redirect });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entry_points(&self) -> &[Binding] {
        &self.entry_points
    }

    pub fn fallbacks(&self) -> &[Binding] {
        &self.fallbacks
    }

    pub fn gate_rule(&self) -> Option<Gate> {
        self.gate
    }

    /// Entries registered for `state`, empty if the level does not own it
    pub fn entries(&self, state: StateId) -> &[Entry] {
        self.states
            .iter()
            .find(|(owned, _)| *owned == state)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn owns(&self, state: StateId) -> bool {
        self.states.iter().any(|(owned, _)| *owned == state)
    }

    /// Parent state for an internal state, if the remap table has one
    pub fn remap(&self, state: StateId) -> Option<StateId> {
        self.remap
            .iter()
            .find(|(from, _)| *from == state)
            .map(|(_, to)| *to)
    }

    /// Child levels nested under `state`, in registration order
    pub fn children(&self, state: StateId) -> impl Iterator<Item = LevelId> + '_ {
        self.entries(state).iter().filter_map(|entry| match entry {
            Entry::Child(child) => Some(*child),
            Entry::Bind(_) => None,
        })
    }
}
