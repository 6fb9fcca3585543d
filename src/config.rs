//! # Configuration Module
//!
//! Bot configuration is read from a YAML file, then selected values are
//! overridden from the environment (`.env` is loaded first by the binary).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use teloxide::types::ChatId;

use crate::errors::ConfigError;
use crate::settings::{AnalysisSettings, SettingKind};

// Constants for configuration defaults
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const CONFIG_PATH_ENV: &str = "FACEWATCH_CONFIG";
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const DEFAULT_FRAMES_DIR: &str = "frames";
pub const DEFAULT_FPS: u32 = 25;
pub const DEFAULT_FACES: u32 = 3;
pub const DEFAULT_SECONDS: u32 = 5;
pub const DEFAULT_FRAME_PERCENTAGE: u32 = 100;
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LOG_TAIL_LINES: usize = 20;

/// Telegram access configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token
    pub token: String,
    /// Chat ids allowed to log in with /start
    pub authorized_chats: Vec<i64>,
}

impl TelegramConfig {
    pub fn is_authorized(&self, chat_id: ChatId) -> bool {
        self.authorized_chats.contains(&chat_id.0)
    }
}

/// Video feed and scan defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory holding the decoded frames of the feed
    pub frames_dir: PathBuf,
    /// Frame rate of the feed
    pub fps: u32,
    /// Initial maximum number of faces per scan
    pub faces: u32,
    /// Initial scan duration in seconds of footage
    pub seconds: u32,
    /// Initial share of frames examined, in percent
    pub frame_percentage: u32,
    /// Whether the background watcher starts enabled
    pub detection_enabled: bool,
    /// Pause between two background scans
    pub watch_interval_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from(DEFAULT_FRAMES_DIR),
            fps: DEFAULT_FPS,
            faces: DEFAULT_FACES,
            seconds: DEFAULT_SECONDS,
            frame_percentage: DEFAULT_FRAME_PERCENTAGE,
            detection_enabled: false,
            watch_interval_secs: DEFAULT_WATCH_INTERVAL_SECS,
        }
    }
}

impl AnalysisConfig {
    pub fn initial_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            face_number: self.faces,
            seconds: self.seconds,
            frame_percentage: self.frame_percentage,
            detection_enabled: self.detection_enabled,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Plain-text log file, also served by the "log" button
    pub file: Option<PathBuf>,
    /// Number of trailing lines sent by the "log" button
    pub tail_lines: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            tail_lines: DEFAULT_LOG_TAIL_LINES,
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
    /// PostgreSQL URL for persistent sessions; in-memory sessions when absent
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read a YAML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Load from the file named by `FACEWATCH_CONFIG` (or `config.yaml`),
    /// apply environment overrides and validate.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.telegram.token = token;
        }
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|u| !u.is_empty()) {
            self.database_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "telegram token is missing (set telegram.token or {TOKEN_ENV})"
            )));
        }
        if self.analysis.fps == 0 {
            return Err(ConfigError::Invalid("analysis.fps must be positive".to_string()));
        }
        let initial = self.analysis.initial_settings();
        for kind in SettingKind::ALL {
            kind.validate(initial.value(kind))
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}
