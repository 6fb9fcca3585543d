//! Event classification: raw chat input into symbolic event tags.

use teloxide::utils::command::BotCommands;

/// Callback payload of the settings button
pub const SETTINGS_CLICK: &str = "settings";
pub const TOGGLE_CLICK: &str = "toggle";
pub const LOG_CLICK: &str = "log";
pub const FACES_CLICK: &str = "faces";
pub const SECONDS_CLICK: &str = "seconds";
pub const PERCENTAGE_CLICK: &str = "percentage";
pub const BACK_CLICK: &str = "back";
pub const EXIT_CLICK: &str = "exit";

/// Text commands understood by the bot
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "log in and show the main menu")]
    Start,
    #[command(description = "open the settings menu")]
    Menu,
    #[command(description = "show the current frame of the video feed")]
    Snapshot,
}

/// A classified button click
///
/// Known buttons get their own variant; every other payload (setting values,
/// snapshot buttons, stale keyboards) is kept verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Click {
    Settings,
    Toggle,
    Log,
    Faces,
    Seconds,
    Percentage,
    Back,
    Exit,
    Other(String),
}

impl Click {
    pub fn from_payload(payload: &str) -> Self {
        match payload {
            SETTINGS_CLICK => Click::Settings,
            TOGGLE_CLICK => Click::Toggle,
            LOG_CLICK => Click::Log,
            FACES_CLICK => Click::Faces,
            SECONDS_CLICK => Click::Seconds,
            PERCENTAGE_CLICK => Click::Percentage,
            BACK_CLICK => Click::Back,
            EXIT_CLICK => Click::Exit,
            other => Click::Other(other.to_string()),
        }
    }

    /// The callback payload that produces this click
    pub fn payload(&self) -> &str {
        match self {
            Click::Settings => SETTINGS_CLICK,
            Click::Toggle => TOGGLE_CLICK,
            Click::Log => LOG_CLICK,
            Click::Faces => FACES_CLICK,
            Click::Seconds => SECONDS_CLICK,
            Click::Percentage => PERCENTAGE_CLICK,
            Click::Back => BACK_CLICK,
            Click::Exit => EXIT_CLICK,
            Click::Other(payload) => payload,
        }
    }
}

/// Symbolic identifier for a recognized input
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventTag {
    Command(Command),
    Click(Click),
}

impl EventTag {
    pub fn click(payload: &str) -> Self {
        EventTag::Click(Click::from_payload(payload))
    }

    pub fn as_click(&self) -> Option<&Click> {
        match self {
            EventTag::Click(click) => Some(click),
            EventTag::Command(_) => None,
        }
    }
}

/// Classify message text. Only exact commands are recognized; any other text
/// returns `None` and is dropped by the caller.
pub fn classify_text(text: &str, bot_name: &str) -> Option<EventTag> {
    Command::parse(text.trim(), bot_name)
        .ok()
        .map(EventTag::Command)
}

/// Classify a callback payload. Every payload is a click, possibly `Other`.
pub fn classify_callback(payload: &str) -> EventTag {
    EventTag::click(payload)
}

/// Matching rule of a binding
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// Exact text command
    Command(Command),
    /// Exactly this click
    Literal(Click),
    /// Every click except this one
    ExceptTag(Click),
    /// Every click
    Any,
}

impl Pattern {
    pub fn matches(&self, event: &EventTag) -> bool {
        match (self, event) {
            (Pattern::Command(expected), EventTag::Command(got)) => expected == got,
            (Pattern::Literal(expected), EventTag::Click(got)) => expected == got,
            (Pattern::ExceptTag(excluded), EventTag::Click(got)) => excluded != got,
            (Pattern::Any, EventTag::Click(_)) => true,
            _ => false,
        }
    }
}
