//! Analysis settings changed from the settings menu.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::errors::SettingsError;

/// Current scan configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Maximum faces collected by one scan
    pub face_number: u32,
    /// Seconds of footage covered by one scan
    pub seconds: u32,
    /// Share of frames examined, in percent
    pub frame_percentage: u32,
    /// Whether the background watcher broadcasts detections
    pub detection_enabled: bool,
}

impl AnalysisSettings {
    pub fn value(&self, kind: SettingKind) -> u32 {
        match kind {
            SettingKind::FaceNumber => self.face_number,
            SettingKind::Seconds => self.seconds,
            SettingKind::FramePercentage => self.frame_percentage,
        }
    }

    fn set(&mut self, kind: SettingKind, value: u32) {
        match kind {
            SettingKind::FaceNumber => self.face_number = value,
            SettingKind::Seconds => self.seconds = value,
            SettingKind::FramePercentage => self.frame_percentage = value,
        }
    }
}

/// Numeric settings reachable from the settings menu
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SettingKind {
    FaceNumber,
    Seconds,
    FramePercentage,
}

impl SettingKind {
    pub const ALL: [SettingKind; 3] = [
        SettingKind::FaceNumber,
        SettingKind::Seconds,
        SettingKind::FramePercentage,
    ];

    /// Prefix of the `prefix:value` callback payload
    pub fn prefix(&self) -> &'static str {
        match self {
            SettingKind::FaceNumber => "faces",
            SettingKind::Seconds => "seconds",
            SettingKind::FramePercentage => "percentage",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SettingKind::FaceNumber => "face_number",
            SettingKind::Seconds => "seconds",
            SettingKind::FramePercentage => "frame_percentage",
        }
    }

    /// Values offered by the picker keyboard
    pub fn choices(&self) -> &'static [u32] {
        match self {
            SettingKind::FaceNumber => &[1, 2, 3, 5, 10],
            SettingKind::Seconds => &[1, 2, 5, 10, 30],
            SettingKind::FramePercentage => &[10, 25, 50, 100],
        }
    }

    pub fn bounds(&self) -> (u32, u32) {
        match self {
            SettingKind::FaceNumber => (1, 50),
            SettingKind::Seconds => (1, 300),
            SettingKind::FramePercentage => (1, 100),
        }
    }

    pub fn validate(&self, value: u32) -> Result<u32, SettingsError> {
        let (min, max) = self.bounds();
        if value < min || value > max {
            return Err(SettingsError::OutOfRange {
                setting: self.name(),
                value,
                min,
                max,
            });
        }
        Ok(value)
    }

    pub fn payload(&self, value: u32) -> String {
        format!("{}:{}", self.prefix(), value)
    }
}

/// Parse a `prefix:value` payload sent by a picker button
pub fn parse_setting_payload(payload: &str) -> Result<(SettingKind, u32), SettingsError> {
    let (prefix, raw) = payload
        .split_once(':')
        .ok_or_else(|| SettingsError::UnknownPayload(payload.to_string()))?;

    let kind = SettingKind::ALL
        .into_iter()
        .find(|kind| kind.prefix() == prefix)
        .ok_or_else(|| SettingsError::UnknownPayload(payload.to_string()))?;

    let value: u32 = raw.trim().parse().map_err(|_| SettingsError::InvalidValue {
        setting: kind.name(),
        value: raw.to_string(),
    })?;

    Ok((kind, kind.validate(value)?))
}

/// Shared settings, read by every scan and changed from the settings menu
#[derive(Debug)]
pub struct SettingsStore {
    inner: RwLock<AnalysisSettings>,
}

impl SettingsStore {
    pub fn new(initial: AnalysisSettings) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub async fn get(&self) -> AnalysisSettings {
        *self.inner.read().await
    }

    /// Store an absolute value. Setting the same value twice is a no-op.
    pub async fn set(&self, kind: SettingKind, value: u32) -> Result<AnalysisSettings, SettingsError> {
        let value = kind.validate(value)?;
        let mut settings = self.inner.write().await;
        settings.set(kind, value);
        Ok(*settings)
    }

    /// Flip the detection switch, returning the new value
    pub async fn toggle_detection(&self) -> bool {
        let mut settings = self.inner.write().await;
        settings.detection_enabled = !settings.detection_enabled;
        settings.detection_enabled
    }
}
