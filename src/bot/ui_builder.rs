//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import callback payloads
use crate::conversation::event::{
    BACK_CLICK, EXIT_CLICK, FACES_CLICK, LOG_CLICK, PERCENTAGE_CLICK, SECONDS_CLICK,
    SETTINGS_CLICK, TOGGLE_CLICK,
};

use crate::settings::{AnalysisSettings, SettingKind};

/// Payload of the snapshot "scan" button
pub const SCAN_PAYLOAD: &str = "scan";
/// Payload of the snapshot "refresh" button
pub const REFRESH_PAYLOAD: &str = "refresh";

/// Telegram rejects messages above 4096 characters
pub const MAX_MESSAGE_CHARS: usize = 4000;

fn on_off(enabled: bool, language_code: Option<&str>) -> String {
    t_lang(if enabled { "state-on" } else { "state-off" }, language_code)
}

/// Keyboard shown right after login
pub fn create_logged_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t_lang("menu-settings", language_code),
            SETTINGS_CLICK,
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("menu-exit", language_code),
            EXIT_CLICK,
        )],
    ])
}

/// Settings menu with the current values on the buttons
pub fn create_settings_keyboard(
    settings: &AnalysisSettings,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let state = on_off(settings.detection_enabled, language_code);
    let faces = settings.face_number.to_string();
    let seconds = settings.seconds.to_string();
    let percentage = settings.frame_percentage.to_string();

    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t_args_lang("settings-detection", &[("state", &state)], language_code),
            TOGGLE_CLICK,
        )],
        vec![
            InlineKeyboardButton::callback(
                t_args_lang("settings-faces", &[("value", &faces)], language_code),
                FACES_CLICK,
            ),
            InlineKeyboardButton::callback(
                t_args_lang("settings-seconds", &[("value", &seconds)], language_code),
                SECONDS_CLICK,
            ),
            InlineKeyboardButton::callback(
                t_args_lang("settings-percentage", &[("value", &percentage)], language_code),
                PERCENTAGE_CLICK,
            ),
        ],
        vec![
            InlineKeyboardButton::callback(t_lang("settings-log", language_code), LOG_CLICK),
            InlineKeyboardButton::callback(t_lang("menu-exit", language_code), EXIT_CLICK),
        ],
    ])
}

/// Value picker for one numeric setting, the current value is checked
pub fn create_value_picker_keyboard(
    kind: SettingKind,
    current: u32,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let choices = kind
        .choices()
        .iter()
        .map(|value| {
            let label = if *value == current {
                format!("✅ {value}")
            } else {
                value.to_string()
            };
            InlineKeyboardButton::callback(label, kind.payload(*value))
        })
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(vec![
        choices,
        vec![InlineKeyboardButton::callback(
            t_lang("menu-back", language_code),
            BACK_CLICK,
        )],
    ])
}

/// Keyboard attached to a snapshot
pub fn create_snapshot_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(t_lang("snapshot-scan", language_code), SCAN_PAYLOAD),
            InlineKeyboardButton::callback(
                t_lang("snapshot-refresh", language_code),
                REFRESH_PAYLOAD,
            ),
        ],
        vec![InlineKeyboardButton::callback(
            t_lang("menu-exit", language_code),
            EXIT_CLICK,
        )],
    ])
}

/// One-line summary of the settings, used as menu text
pub fn format_settings(settings: &AnalysisSettings, language_code: Option<&str>) -> String {
    let state = on_off(settings.detection_enabled, language_code);
    format!(
        "⚙️ {}\n\n{}",
        t_lang("settings-title", language_code),
        t_args_lang(
            "settings-summary",
            &[
                ("state", &state),
                ("faces", &settings.face_number.to_string()),
                ("seconds", &settings.seconds.to_string()),
                ("percentage", &settings.frame_percentage.to_string()),
            ],
            language_code,
        )
    )
}

/// Last `lines` lines of `content`, cut to fit in one message
pub fn format_log_tail(content: &str, lines: usize) -> String {
    let all: Vec<&str> = content.lines().collect();
    let tail = all[all.len().saturating_sub(lines)..].join("\n");

    let count = tail.chars().count();
    if count <= MAX_MESSAGE_CHARS {
        return tail;
    }
    tail.chars().skip(count - MAX_MESSAGE_CHARS).collect()
}
