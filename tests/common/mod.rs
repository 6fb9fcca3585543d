#![allow(dead_code)]

pub mod walk;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::DynamicImage;
use teloxide::types::{ChatId, InlineKeyboardMarkup};
use tokio::sync::Mutex;

use facewatch::bot::{ActionDispatcher, LogSource, Notifier, Router};
use facewatch::config::TelegramConfig;
use facewatch::errors::ScanError;
use facewatch::scan::ScanOutcome;
use facewatch::session::InMemSessionStore;
use facewatch::settings::{AnalysisSettings, SettingsStore};
use facewatch::video::Scanner;

pub const AUTHORIZED: ChatId = ChatId(1001);
pub const OTHER_AUTHORIZED: ChatId = ChatId(1002);
pub const STRANGER: ChatId = ChatId(666);

/// One message recorded by [`RecordingNotifier`]
#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Text { chat_id: ChatId, text: String },
    Image { chat_id: ChatId, caption: Option<String> },
}

impl Sent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Sent::Text { chat_id, .. } | Sent::Image { chat_id, .. } => *chat_id,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Sent::Text { text, .. } => Some(text),
            Sent::Image { .. } => None,
        }
    }
}

/// Notifier that records everything and can refuse one chat
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    failing_chat: Option<ChatId>,
}

impl RecordingNotifier {
    pub fn failing_for(chat_id: ChatId) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing_chat: Some(chat_id),
        }
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    pub async fn texts_for(&self, chat_id: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| s.chat_id() == chat_id)
            .filter_map(|s| s.text().map(str::to_string))
            .collect()
    }

    pub async fn images_for(&self, chat_id: ChatId) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| s.chat_id() == chat_id && matches!(s, Sent::Image { .. }))
            .count()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: String,
        _keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        if self.failing_chat == Some(chat_id) {
            return Err(anyhow!("chat {chat_id} blocked the bot"));
        }
        self.sent.lock().await.push(Sent::Text { chat_id, text });
        Ok(())
    }

    async fn send_image(
        &self,
        chat_id: ChatId,
        _png: Vec<u8>,
        caption: Option<String>,
        _keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        if self.failing_chat == Some(chat_id) {
            return Err(anyhow!("chat {chat_id} blocked the bot"));
        }
        self.sent.lock().await.push(Sent::Image { chat_id, caption });
        Ok(())
    }
}

/// Scanner returning canned faces
#[derive(Default)]
pub struct FakeScanner {
    pub faces: usize,
    pub frames_examined: usize,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub scans: Mutex<Vec<AnalysisSettings>>,
}

impl FakeScanner {
    pub fn with_faces(faces: usize) -> Self {
        Self {
            faces,
            frames_examined: 10,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(faces: usize, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_faces(faces)
        }
    }

    pub async fn scan_count(&self) -> usize {
        self.scans.lock().await.len()
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    async fn snapshot(&self) -> Result<Option<DynamicImage>, ScanError> {
        if self.fail {
            return Err(ScanError::Worker("camera unplugged".to_string()));
        }
        Ok(Some(DynamicImage::new_rgb8(8, 8)))
    }

    async fn scan(
        &self,
        settings: AnalysisSettings,
        _after: Option<PathBuf>,
    ) -> Result<ScanOutcome, ScanError> {
        self.scans.lock().await.push(settings);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ScanError::Worker("camera unplugged".to_string()));
        }
        let faces = self.faces.min(settings.face_number as usize);
        Ok(ScanOutcome {
            faces: (0..faces).map(|_| DynamicImage::new_rgb8(4, 4)).collect(),
            frames_examined: self.frames_examined,
            newest_frame: None,
        })
    }
}

pub fn test_settings() -> AnalysisSettings {
    AnalysisSettings {
        face_number: 3,
        seconds: 5,
        frame_percentage: 100,
        detection_enabled: false,
    }
}

/// Router and the collaborators it was built from
pub struct Harness {
    pub router: Arc<Router>,
    pub notifier: Arc<RecordingNotifier>,
    pub scanner: Arc<FakeScanner>,
    pub settings: Arc<SettingsStore>,
    pub sessions: Arc<InMemSessionStore>,
}

impl Harness {
    pub fn new(scanner: FakeScanner) -> Self {
        Self::with_notifier(scanner, RecordingNotifier::default())
    }

    pub fn with_notifier(scanner: FakeScanner, notifier: RecordingNotifier) -> Self {
        Self::build(scanner, notifier, LogSource::default())
    }

    pub fn with_log(scanner: FakeScanner, log: LogSource) -> Self {
        Self::build(scanner, RecordingNotifier::default(), log)
    }

    fn build(scanner: FakeScanner, notifier: RecordingNotifier, log: LogSource) -> Self {
        let notifier = Arc::new(notifier);
        let scanner = Arc::new(scanner);
        let settings = Arc::new(SettingsStore::new(test_settings()));
        let sessions = Arc::new(InMemSessionStore::new());
        let access = TelegramConfig {
            token: "test-token".to_string(),
            authorized_chats: vec![AUTHORIZED.0, OTHER_AUTHORIZED.0],
        };
        let actions = ActionDispatcher::new(
            notifier.clone(),
            scanner.clone(),
            Arc::clone(&settings),
            access,
            log,
        );
        let router = Arc::new(Router::new(sessions.clone(), actions));
        Self {
            router,
            notifier,
            scanner,
            settings,
            sessions,
        }
    }
}
