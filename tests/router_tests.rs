mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teloxide::types::ChatId;

use common::walk::Walk;
use common::{
    FakeScanner, Harness, RecordingNotifier, Sent, AUTHORIZED, OTHER_AUTHORIZED, STRANGER,
};
use facewatch::bot::{IncomingEvent, LogSource, RouteOutcome};
use facewatch::conversation::{build_conversation, Action, Command, EventTag, Frame, StateId};
use facewatch::localization::{t, t_args};
use facewatch::session::SessionStore;
use facewatch::watcher::Watcher;

fn command(chat_id: ChatId, command: Command) -> IncomingEvent {
    IncomingEvent::new(chat_id, EventTag::Command(command))
}

fn click(chat_id: ChatId, payload: &str) -> IncomingEvent {
    IncomingEvent::new(chat_id, EventTag::click(payload))
}

async fn state_of(harness: &Harness, chat_id: ChatId) -> Result<StateId> {
    let session = harness.sessions.lookup(chat_id).await?;
    Ok(session.map(|s| s.state()).unwrap_or(StateId::NotLogged))
}

#[tokio::test]
async fn test_start_menu_and_face_number() -> Result<()> {
    let harness = Harness::new(FakeScanner::with_faces(0));
    let router = &harness.router;

    let outcome = router.route(command(AUTHORIZED, Command::Start)).await?;
    assert_eq!(
        outcome,
        RouteOutcome::Handled {
            action: Action::Start,
            state: StateId::Logged
        }
    );

    let outcome = router.route(command(AUTHORIZED, Command::Menu)).await?;
    assert_eq!(outcome.state(), StateId::Settings);

    let outcome = router.route(click(AUTHORIZED, "faces")).await?;
    assert_eq!(outcome.state(), StateId::RespSettings);

    let outcome = router.route(click(AUTHORIZED, "faces:5")).await?;
    assert_eq!(
        outcome,
        RouteOutcome::Handled {
            action: Action::SettingResp,
            state: StateId::Settings
        }
    );
    assert_eq!(harness.settings.get().await.face_number, 5);

    let texts = harness.notifier.texts_for(AUTHORIZED).await;
    let updated = t_args("setting-updated", &[("setting", "face_number"), ("value", "5")]);
    assert!(texts.contains(&updated), "missing confirmation in {texts:?}");

    Ok(())
}

#[tokio::test]
async fn test_start_twice_is_idempotent() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());

    harness.router.route(command(AUTHORIZED, Command::Start)).await?;
    let first = harness.sessions.lookup(AUTHORIZED).await?.map(|s| s.path);
    let sent_once = harness.notifier.sent().await.len();

    let outcome = harness.router.route(command(AUTHORIZED, Command::Start)).await?;
    assert_eq!(outcome.state(), StateId::Logged);
    assert_eq!(harness.sessions.lookup(AUTHORIZED).await?.map(|s| s.path), first);
    assert_eq!(harness.notifier.sent().await.len(), sent_once);

    Ok(())
}

#[tokio::test]
async fn test_unauthorized_chat_stays_logged_out() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());

    let outcome = harness.router.route(command(STRANGER, Command::Start)).await?;
    assert_eq!(outcome.state(), StateId::NotLogged);
    assert_eq!(
        harness.notifier.texts_for(STRANGER).await,
        vec![t("not-authorized")]
    );

    let outcome = harness.router.route(click(STRANGER, "settings")).await?;
    assert_eq!(outcome, RouteOutcome::Unhandled { state: StateId::NotLogged });

    let session = harness.sessions.lookup(STRANGER).await?.expect("session stored");
    assert!(!session.is_active);
    assert!(harness.sessions.active_chats().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_redelivered_update_is_dropped() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());
    let router = &harness.router;

    router
        .route(command(AUTHORIZED, Command::Start).with_update_id(10))
        .await?;
    router
        .route(click(AUTHORIZED, "settings").with_update_id(11))
        .await?;
    router.route(click(AUTHORIZED, "toggle").with_update_id(12)).await?;
    assert!(harness.settings.get().await.detection_enabled);

    let outcome = router.route(click(AUTHORIZED, "toggle").with_update_id(12)).await?;
    assert_eq!(outcome, RouteOutcome::Duplicate { state: StateId::Settings });
    assert!(harness.settings.get().await.detection_enabled);

    let session = harness.sessions.lookup(AUTHORIZED).await?.expect("session stored");
    assert_eq!(session.last_update_id, Some(12));

    Ok(())
}

#[tokio::test]
async fn test_unrecognized_click_is_silently_dropped() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());

    let outcome = harness.router.route(click(AUTHORIZED, "faces:3")).await?;
    assert_eq!(outcome, RouteOutcome::Unhandled { state: StateId::NotLogged });
    assert!(harness.notifier.sent().await.is_empty());
    assert!(harness.sessions.lookup(AUTHORIZED).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_invalid_setting_value_unwinds_to_logged() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());
    let router = &harness.router;

    router.route(command(AUTHORIZED, Command::Start)).await?;
    router.route(click(AUTHORIZED, "settings")).await?;
    router.route(click(AUTHORIZED, "faces")).await?;

    let outcome = router.route(click(AUTHORIZED, "faces:999")).await?;
    assert_eq!(outcome.state(), StateId::Logged);
    assert_eq!(harness.settings.get().await.face_number, 3);

    let texts = harness.notifier.texts_for(AUTHORIZED).await;
    assert_eq!(texts.last(), Some(&t("error-action-failed")));

    Ok(())
}

#[tokio::test]
async fn test_failing_scan_reports_and_recovers() -> Result<()> {
    let harness = Harness::new(FakeScanner::failing());
    let router = &harness.router;

    router.route(command(AUTHORIZED, Command::Start)).await?;
    let outcome = router.route(click(AUTHORIZED, "scan")).await?;
    assert_eq!(
        outcome,
        RouteOutcome::Handled {
            action: Action::SnapshotResp,
            state: StateId::Logged
        }
    );
    let texts = harness.notifier.texts_for(AUTHORIZED).await;
    assert_eq!(texts.last(), Some(&t("error-action-failed")));

    // The session is not stuck
    let outcome = router.route(click(AUTHORIZED, "settings")).await?;
    assert_eq!(outcome.state(), StateId::Settings);

    Ok(())
}

#[tokio::test]
async fn test_snapshot_scan_sends_faces() -> Result<()> {
    let harness = Harness::new(FakeScanner::with_faces(2));
    let router = &harness.router;

    router.route(command(AUTHORIZED, Command::Start)).await?;
    let outcome = router.route(command(AUTHORIZED, Command::Snapshot)).await?;
    assert_eq!(outcome.state(), StateId::Logged);
    assert_eq!(harness.notifier.images_for(AUTHORIZED).await, 1);

    router.route(click(AUTHORIZED, "scan")).await?;
    assert_eq!(harness.scanner.scan_count().await, 1);
    assert_eq!(harness.notifier.images_for(AUTHORIZED).await, 3);

    let texts = harness.notifier.texts_for(AUTHORIZED).await;
    assert!(texts.contains(&t("scan-started")));
    assert!(texts.contains(&t_args("scan-found", &[("count", "2"), ("frames", "10")])));

    Ok(())
}

#[tokio::test]
async fn test_exit_during_scan_waits_for_it() -> Result<()> {
    let harness = Harness::new(FakeScanner::slow(1, Duration::from_millis(200)));
    let router = Arc::clone(&harness.router);

    router.route(command(AUTHORIZED, Command::Start)).await?;
    harness.notifier.clear().await;

    let scanning = {
        let router = Arc::clone(&router);
        tokio::spawn(async move { router.route(click(AUTHORIZED, "scan")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let outcome = router.route(click(AUTHORIZED, "exit")).await?;
    assert_eq!(outcome.state(), StateId::Logged);
    scanning.await??;

    let sent = harness.notifier.sent().await;
    assert_eq!(sent.first().and_then(Sent::text), Some(t("scan-started").as_str()));
    assert_eq!(sent.last().and_then(Sent::text), Some(t("goodbye").as_str()));
    assert_eq!(state_of(&harness, AUTHORIZED).await?, StateId::Logged);

    Ok(())
}

#[tokio::test]
async fn test_chats_are_not_blocked_by_each_other() -> Result<()> {
    let harness = Harness::new(FakeScanner::slow(1, Duration::from_millis(500)));
    let router = Arc::clone(&harness.router);

    router.route(command(AUTHORIZED, Command::Start)).await?;
    let scanning = {
        let router = Arc::clone(&router);
        tokio::spawn(async move { router.route(click(AUTHORIZED, "scan")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let other = tokio::time::timeout(
        Duration::from_millis(250),
        router.route(command(OTHER_AUTHORIZED, Command::Start)),
    )
    .await??;
    assert_eq!(other.state(), StateId::Logged);
    assert!(!scanning.is_finished());

    scanning.await??;
    Ok(())
}

#[tokio::test]
async fn test_events_of_one_chat_apply_in_order() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());
    let router = Arc::clone(&harness.router);

    router.route(command(AUTHORIZED, Command::Start)).await?;
    router.route(command(OTHER_AUTHORIZED, Command::Start)).await?;

    let first = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            for payload in ["settings", "faces", "faces:10"] {
                router.route(click(AUTHORIZED, payload)).await?;
            }
            anyhow::Ok(())
        })
    };
    let second = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            for payload in ["settings", "toggle", "exit"] {
                router.route(click(OTHER_AUTHORIZED, payload)).await?;
            }
            anyhow::Ok(())
        })
    };
    first.await??;
    second.await??;

    assert_eq!(state_of(&harness, AUTHORIZED).await?, StateId::Settings);
    assert_eq!(state_of(&harness, OTHER_AUTHORIZED).await?, StateId::Logged);
    let settings = harness.settings.get().await;
    assert_eq!(settings.face_number, 10);
    assert!(settings.detection_enabled);

    Ok(())
}

#[tokio::test]
async fn test_settings_toggle_back_with_interleaved_chat() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());
    let router = Arc::clone(&harness.router);

    router.route(command(AUTHORIZED, Command::Start)).await?;

    let noise = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            for _ in 0..5 {
                router.route(click(STRANGER, "toggle")).await?;
                router.route(click(OTHER_AUTHORIZED, "refresh")).await?;
                tokio::task::yield_now().await;
            }
            anyhow::Ok(())
        })
    };
    for payload in ["settings", "toggle", "back"] {
        router.route(click(AUTHORIZED, payload)).await?;
        tokio::task::yield_now().await;
    }
    noise.await??;

    let session = harness.sessions.lookup(AUTHORIZED).await?.expect("session stored");
    assert_eq!(session.state(), StateId::Settings);
    assert_eq!(session.path.len(), 2);
    assert!(harness.settings.get().await.detection_enabled);

    Ok(())
}

#[tokio::test]
async fn test_watcher_broadcasts_to_logged_in_chats() -> Result<()> {
    let harness = Harness::with_notifier(
        FakeScanner::with_faces(2),
        RecordingNotifier::failing_for(OTHER_AUTHORIZED),
    );
    let router = &harness.router;

    router.route(command(AUTHORIZED, Command::Start)).await?;
    router.route(command(OTHER_AUTHORIZED, Command::Start)).await?;
    router.route(command(STRANGER, Command::Start)).await?;

    let watcher = Watcher::new(
        harness.scanner.clone(),
        Arc::clone(&harness.settings),
        harness.notifier.clone(),
        harness.sessions.clone(),
    );

    // Detection starts disabled
    assert_eq!(watcher.watch_once().await?, 0);
    assert_eq!(harness.scanner.scan_count().await, 0);

    router.route(click(AUTHORIZED, "settings")).await?;
    router.route(click(AUTHORIZED, "toggle")).await?;
    harness.notifier.clear().await;

    assert_eq!(watcher.watch_once().await?, 2);
    assert_eq!(
        harness.notifier.texts_for(AUTHORIZED).await,
        vec![t_args("alert-faces", &[("count", "2")])]
    );
    assert_eq!(harness.notifier.images_for(AUTHORIZED).await, 2);
    assert!(harness.notifier.texts_for(STRANGER).await.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_update_id_reset_does_not_mute_chat() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());
    let router = &harness.router;

    router
        .route(command(AUTHORIZED, Command::Start).with_update_id(900_000))
        .await?;

    // Telegram restarted its update counter
    let outcome = router
        .route(click(AUTHORIZED, "settings").with_update_id(12))
        .await?;
    assert_eq!(
        outcome,
        RouteOutcome::Handled {
            action: Action::ShowSettings,
            state: StateId::Settings
        }
    );

    let outcome = router.route(click(AUTHORIZED, "exit").with_update_id(13)).await?;
    assert_eq!(
        outcome,
        RouteOutcome::Handled {
            action: Action::Exit,
            state: StateId::Logged
        }
    );

    let outcome = router.route(click(AUTHORIZED, "exit").with_update_id(13)).await?;
    assert_eq!(outcome, RouteOutcome::Duplicate { state: StateId::Logged });

    Ok(())
}

#[tokio::test]
async fn test_exit_keeps_chat_logged_in() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());
    let router = &harness.router;

    router.route(command(AUTHORIZED, Command::Start)).await?;
    router.route(click(AUTHORIZED, "settings")).await?;
    router.route(click(AUTHORIZED, "exit")).await?;

    let session = harness.sessions.lookup(AUTHORIZED).await?.expect("session stored");
    assert!(session.is_active);
    assert_eq!(session.state(), StateId::Logged);
    assert_eq!(harness.sessions.active_chats().await?, vec![AUTHORIZED]);

    // The menu opens again without a new /start
    let outcome = router.route(command(AUTHORIZED, Command::Menu)).await?;
    assert_eq!(
        outcome,
        RouteOutcome::Handled {
            action: Action::ShowLoggedMenu,
            state: StateId::Settings
        }
    );

    Ok(())
}

async fn open_log(harness: &Harness) -> Result<RouteOutcome> {
    let router = &harness.router;
    router.route(command(AUTHORIZED, Command::Start)).await?;
    router.route(click(AUTHORIZED, "settings")).await?;
    harness.notifier.clear().await;
    router.route(click(AUTHORIZED, "log")).await
}

#[tokio::test]
async fn test_log_button_sends_last_lines() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("facewatch.log");
    let content: String = (1..=50).map(|i| format!("line {i}\n")).collect();
    std::fs::write(&path, content)?;

    let harness = Harness::with_log(
        FakeScanner::default(),
        LogSource {
            file: Some(path),
            tail_lines: 5,
        },
    );

    let outcome = open_log(&harness).await?;
    assert_eq!(
        outcome,
        RouteOutcome::Handled {
            action: Action::GetLog,
            state: StateId::Settings
        }
    );

    let texts = harness.notifier.texts_for(AUTHORIZED).await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with(&t("log-title")));
    assert!(texts[0].contains("line 46"));
    assert!(texts[0].contains("line 50"));
    assert!(!texts[0].contains("line 45"));

    Ok(())
}

#[tokio::test]
async fn test_missing_log_file_unwinds_to_logged() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let harness = Harness::with_log(
        FakeScanner::default(),
        LogSource {
            file: Some(dir.path().join("missing.log")),
            tail_lines: 5,
        },
    );

    let outcome = open_log(&harness).await?;
    assert_eq!(
        outcome,
        RouteOutcome::Handled {
            action: Action::GetLog,
            state: StateId::Logged
        }
    );
    assert_eq!(
        harness.notifier.texts_for(AUTHORIZED).await,
        vec![t("error-action-failed")]
    );

    Ok(())
}

#[tokio::test]
async fn test_log_button_without_file_or_content() -> Result<()> {
    let harness = Harness::new(FakeScanner::default());
    open_log(&harness).await?;
    assert_eq!(
        harness.notifier.texts_for(AUTHORIZED).await,
        vec![t("log-unavailable")]
    );

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.log");
    std::fs::write(&path, "")?;
    let harness = Harness::with_log(
        FakeScanner::default(),
        LogSource {
            file: Some(path),
            tail_lines: 5,
        },
    );
    let outcome = open_log(&harness).await?;
    assert_eq!(outcome.state(), StateId::Settings);
    assert_eq!(harness.notifier.texts_for(AUTHORIZED).await, vec![t("log-empty")]);

    Ok(())
}

#[tokio::test]
async fn test_chat_locks_are_released() -> Result<()> {
    let harness = Harness::new(FakeScanner::slow(0, Duration::from_millis(20)));
    let router = &harness.router;

    router.route(command(STRANGER, Command::Start)).await?;
    router.route(click(STRANGER, "settings")).await?;
    assert_eq!(router.locked_chats().await, 0);

    let mut tasks = Vec::new();
    for chat_id in [AUTHORIZED, OTHER_AUTHORIZED, AUTHORIZED, OTHER_AUTHORIZED] {
        let router = Arc::clone(router);
        tasks.push(tokio::spawn(async move {
            router.route(command(chat_id, Command::Start)).await?;
            router.route(command(chat_id, Command::Snapshot)).await?;
            router.route(click(chat_id, "scan")).await
        }));
    }
    for task in tasks {
        task.await??;
    }

    assert_eq!(router.locked_chats().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_router_agrees_with_walk() -> Result<()> {
    let harness = Harness::new(FakeScanner::with_faces(1));
    let router = &harness.router;
    let mut walk = Walk::new();
    let initial = build_conversation().initial_path();

    let events = [
        EventTag::click("settings"),
        EventTag::Command(Command::Menu),
        EventTag::Command(Command::Start),
        EventTag::click("settings"),
        EventTag::click("toggle"),
        EventTag::click("faces"),
        EventTag::click("faces:5"),
        EventTag::click("seconds"),
        EventTag::click("seconds:999"),
        EventTag::Command(Command::Menu),
        EventTag::click("percentage"),
        EventTag::click("back"),
        EventTag::click("log"),
        EventTag::Command(Command::Snapshot),
        EventTag::click("refresh"),
        EventTag::click("scan"),
        EventTag::click("stale"),
        EventTag::click("exit"),
        EventTag::click("percentage"),
        EventTag::click("exit"),
        EventTag::Command(Command::Menu),
        EventTag::click("back"),
        EventTag::Command(Command::Start),
        EventTag::click("exit"),
    ];

    for event in events {
        let expected = walk.send(event.clone());
        let outcome = router.route(IncomingEvent::new(AUTHORIZED, event.clone())).await?;

        let action = match &outcome {
            RouteOutcome::Handled { action, .. } => Some(*action),
            _ => None,
        };
        assert_eq!(action, expected, "action for {event:?}");

        let session = harness.sessions.lookup(AUTHORIZED).await?;
        let path: Vec<Frame> = session.map(|s| s.path).unwrap_or_else(|| initial.clone());
        assert_eq!(path, walk.path, "path after {event:?}");
        assert_eq!(outcome.state(), walk.state(), "state after {event:?}");
    }

    Ok(())
}
