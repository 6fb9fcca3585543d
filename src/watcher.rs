//! Background watcher: while detection is enabled, periodically scans the
//! feed and broadcasts detected faces to every logged-in chat.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::bot::notifier::{broadcast_images, broadcast_text, Notifier};
use crate::localization::t_args;
use crate::scan::encode_png;
use crate::session::SessionStore;
use crate::settings::SettingsStore;
use crate::video::Scanner;

/// Periodic scanner of new footage
pub struct Watcher {
    scanner: Arc<dyn Scanner>,
    settings: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
    sessions: Arc<dyn SessionStore>,
    /// Newest frame covered by the previous cycle
    cursor: Mutex<Option<PathBuf>>,
}

impl Watcher {
    pub fn new(
        scanner: Arc<dyn Scanner>,
        settings: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            scanner,
            settings,
            notifier,
            sessions,
            cursor: Mutex::new(None),
        }
    }

    /// Run one watch cycle over frames added since the previous one,
    /// returning the number of faces broadcast
    pub async fn watch_once(&self) -> Result<usize> {
        let settings = self.settings.get().await;
        if !settings.detection_enabled {
            debug!("Detection disabled, skipping watch cycle");
            return Ok(0);
        }

        let mut cursor = self.cursor.lock().await;
        let outcome = self.scanner.scan(settings, cursor.clone()).await?;
        if outcome.newest_frame.is_some() {
            *cursor = outcome.newest_frame.clone();
        }
        drop(cursor);

        if outcome.faces.is_empty() {
            return Ok(0);
        }

        let images = outcome
            .faces
            .iter()
            .map(encode_png)
            .collect::<Result<Vec<_>, _>>()?;

        let count = images.len().to_string();
        let alert = t_args("alert-faces", &[("count", &count)]);
        let chats = broadcast_text(self.notifier.as_ref(), self.sessions.as_ref(), &alert).await?;
        broadcast_images(self.notifier.as_ref(), self.sessions.as_ref(), &images, None).await?;

        info!(faces = images.len(), chats, "Broadcast detected faces");
        Ok(images.len())
    }

    /// Loop forever, one cycle every `interval`
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.watch_once().await {
                error!(error = %e, "Watch cycle failed");
            }
        }
    }
}
