mod common;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use image::DynamicImage;
use tempfile::TempDir;

use common::{RecordingNotifier, AUTHORIZED};
use facewatch::conversation::build_conversation;
use facewatch::session::{InMemSessionStore, Session, SessionStore};
use facewatch::settings::{AnalysisSettings, SettingsStore};
use facewatch::video::VideoScanner;
use facewatch::watcher::Watcher;

fn write_frame(dir: &Path, index: usize, with_face: bool) -> Result<()> {
    let path = dir.join(format!("frame_{index:04}.png"));
    DynamicImage::new_rgb8(32, 24).save(&path)?;
    if with_face {
        std::fs::write(
            path.with_extension("json"),
            r#"[{"x": 2, "y": 2, "width": 8, "height": 8}]"#,
        )?;
    }
    Ok(())
}

async fn logged_in_store() -> Result<Arc<InMemSessionStore>> {
    let sessions = Arc::new(InMemSessionStore::new());
    let mut session = Session::new(AUTHORIZED, &build_conversation());
    session.is_active = true;
    sessions.update(&session).await?;
    Ok(sessions)
}

fn detection_on() -> Arc<SettingsStore> {
    Arc::new(SettingsStore::new(AnalysisSettings {
        face_number: 3,
        seconds: 5,
        frame_percentage: 100,
        detection_enabled: true,
    }))
}

#[tokio::test]
async fn test_unchanged_feed_is_broadcast_once() -> Result<()> {
    let dir = TempDir::new()?;
    for i in 0..4 {
        write_frame(dir.path(), i, i == 0)?;
    }

    let notifier = Arc::new(RecordingNotifier::default());
    let watcher = Watcher::new(
        Arc::new(VideoScanner::new(dir.path(), 25)),
        detection_on(),
        notifier.clone(),
        logged_in_store().await?,
    );

    assert_eq!(watcher.watch_once().await?, 1);
    assert_eq!(watcher.watch_once().await?, 0);
    assert_eq!(watcher.watch_once().await?, 0);
    assert_eq!(notifier.images_for(AUTHORIZED).await, 1);

    // Only the new frame is scanned
    write_frame(dir.path(), 4, true)?;
    assert_eq!(watcher.watch_once().await?, 1);
    assert_eq!(notifier.images_for(AUTHORIZED).await, 2);

    Ok(())
}

#[tokio::test]
async fn test_disabled_detection_does_not_scan() -> Result<()> {
    let dir = TempDir::new()?;
    write_frame(dir.path(), 0, true)?;

    let settings = detection_on();
    settings.toggle_detection().await;

    let notifier = Arc::new(RecordingNotifier::default());
    let watcher = Watcher::new(
        Arc::new(VideoScanner::new(dir.path(), 25)),
        Arc::clone(&settings),
        notifier.clone(),
        logged_in_store().await?,
    );

    assert_eq!(watcher.watch_once().await?, 0);
    assert!(notifier.sent().await.is_empty());

    // The cursor did not move while disabled
    settings.toggle_detection().await;
    assert_eq!(watcher.watch_once().await?, 1);
    Ok(())
}
