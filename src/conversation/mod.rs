//! Conversation state machine
//!
//! - `event`: classification of commands and callback payloads
//! - `level`: states, actions, bindings and the `Level` building block
//! - `machine`: resolution and transition over the active level path
//!
//! The bot's own tree is assembled by [`build_conversation`].

pub mod event;
pub mod level;
pub mod machine;

pub use event::{classify_callback, classify_text, Click, Command, EventTag, Pattern};
pub use level::{Action, Binding, Entry, Level, LevelId, StateId, Transition};
pub use machine::{ConversationTree, Frame, Resolved, ROOT};

pub const TOP_LEVEL: LevelId = ROOT;
pub const MENU_LEVEL: LevelId = LevelId(1);
pub const SETTINGS_LEVEL: LevelId = LevelId(2);
pub const SNAPSHOT_LEVEL: LevelId = LevelId(3);

/// Assemble the bot conversation:
///
/// ```text
/// top ── NOT_LOGGED: /start
///     └─ LOGGED: /menu, /snapshot, menu, snapshot
/// menu ── SETTINGS: settings, back redisplays the menu
/// settings ── entry: toggle, log, faces, seconds, percentage
///          └─ RESP_SETTINGS: any click but back
/// snapshot ── entry: any click but exit
/// ```
pub fn build_conversation() -> ConversationTree {
    use Action::*;
    use StateId::*;

    let top = Level::new("top")
        .entry(Pattern::Command(Command::Start), Start)
        .state(
            NotLogged,
            vec![Entry::bind(Pattern::Command(Command::Start), Start)],
        )
        .state(
            Logged,
            vec![
                Entry::bind(Pattern::Command(Command::Menu), ShowLoggedMenu),
                Entry::bind(Pattern::Command(Command::Snapshot), ShowSnapshot),
                Entry::Child(MENU_LEVEL),
                Entry::Child(SNAPSHOT_LEVEL),
            ],
        )
        .fallback(Pattern::Literal(Click::Exit), Exit)
        .map_to_parent(End, Logged)
        .gate(Logged, NotLogged);

    let menu = Level::new("menu")
        .entry(Pattern::Literal(Click::Settings), ShowSettings)
        .state(Settings, vec![Entry::Child(SETTINGS_LEVEL)])
        .fallback(Pattern::Literal(Click::Exit), Exit)
        .fallback(Pattern::Literal(Click::Back), ShowSettings)
        .map_to_parent(End, Logged)
        .map_to_parent(Logged, Logged)
        .map_to_parent(NotLogged, NotLogged);

    let settings = Level::new("settings")
        .entry(Pattern::Literal(Click::Toggle), Toggle)
        .entry(Pattern::Literal(Click::Log), GetLog)
        .entry(Pattern::Literal(Click::Faces), FaceNumber)
        .entry(Pattern::Literal(Click::Seconds), SecondsToAnalyze)
        .entry(Pattern::Literal(Click::Percentage), FramePercentage)
        .state(
            RespSettings,
            vec![Entry::bind(Pattern::ExceptTag(Click::Back), SettingResp)],
        )
        .fallback(Pattern::Literal(Click::Exit), Exit)
        .fallback(Pattern::Literal(Click::Back), ShowSettings)
        .map_to_parent(End, Logged)
        .map_to_parent(Settings, Settings);

    let snapshot = Level::new("snapshot")
        .entry(Pattern::ExceptTag(Click::Exit), SnapshotResp)
        .fallback(Pattern::Literal(Click::Exit), Exit)
        .map_to_parent(Logged, Logged)
        .map_to_parent(NotLogged, NotLogged);

    ConversationTree::new(vec![top, menu, settings, snapshot], NotLogged)
}
