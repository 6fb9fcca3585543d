//! Action dispatch: the work bound to each conversation binding.
//!
//! Actions send messages and touch the settings and the video feed, then
//! report a [`Transition`]. They never write sessions; the router applies the
//! transition. A failing action is caught here, reported to the chat and
//! turned into an `End` transition so the session unwinds to a resting state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use teloxide::types::ChatId;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, TelegramConfig};
use crate::conversation::{Action, Click, EventTag, StateId, Transition};
use crate::localization::{t_args_lang, t_lang};
use crate::logging::{read_log_tail, LOG_TAIL_BYTES};
use crate::scan::encode_png;
use crate::settings::{parse_setting_payload, SettingKind, SettingsStore};
use crate::video::Scanner;

use super::notifier::Notifier;
use super::ui_builder::{
    create_logged_menu_keyboard, create_settings_keyboard, create_snapshot_keyboard,
    create_value_picker_keyboard, format_log_tail, format_settings, REFRESH_PAYLOAD, SCAN_PAYLOAD,
};

/// Chat context handed to every action
#[derive(Clone, Debug)]
pub struct ActionContext {
    pub chat_id: ChatId,
    pub is_active: bool,
    pub event: EventTag,
    pub language_code: Option<String>,
}

impl ActionContext {
    fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    fn payload(&self) -> Option<&str> {
        self.event.as_click().map(Click::payload)
    }
}

/// Where the "log" button reads from
#[derive(Clone, Debug, Default)]
pub struct LogSource {
    pub file: Option<PathBuf>,
    pub tail_lines: usize,
}

/// Runs actions against the bot's collaborators
pub struct ActionDispatcher {
    notifier: Arc<dyn Notifier>,
    scanner: Arc<dyn Scanner>,
    settings: Arc<SettingsStore>,
    access: TelegramConfig,
    log: LogSource,
}

impl ActionDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        scanner: Arc<dyn Scanner>,
        settings: Arc<SettingsStore>,
        access: TelegramConfig,
        log: LogSource,
    ) -> Self {
        Self {
            notifier,
            scanner,
            settings,
            access,
            log,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        notifier: Arc<dyn Notifier>,
        scanner: Arc<dyn Scanner>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let log = LogSource {
            file: config.logging.file.clone(),
            tail_lines: config.logging.tail_lines,
        };
        Self::new(notifier, scanner, settings, config.telegram.clone(), log)
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// Run `action`, turning failures into a reported `End` transition
    pub async fn dispatch(&self, action: Action, ctx: &ActionContext) -> Transition {
        match self.run(action, ctx).await {
            Ok(transition) => transition,
            Err(e) => {
                error!(
                    chat_id = %ctx.chat_id,
                    action = action.name(),
                    error = %e,
                    "Action failed"
                );
                if let Err(send_err) = self
                    .notifier
                    .send_text(ctx.chat_id, t_lang("error-action-failed", ctx.lang()), None)
                    .await
                {
                    warn!(chat_id = %ctx.chat_id, error = %send_err, "Failed to report action failure");
                }
                Transition::end()
            }
        }
    }

    async fn run(&self, action: Action, ctx: &ActionContext) -> Result<Transition> {
        match action {
            Action::Start => self.start(ctx).await,
            Action::ShowLoggedMenu | Action::ShowSettings => self.show_settings(ctx).await,
            Action::ShowSnapshot => self.show_snapshot(ctx).await,
            Action::Toggle => self.toggle(ctx).await,
            Action::GetLog => self.get_log(ctx).await,
            Action::FaceNumber => self.ask_value(ctx, SettingKind::FaceNumber).await,
            Action::SecondsToAnalyze => self.ask_value(ctx, SettingKind::Seconds).await,
            Action::FramePercentage => self.ask_value(ctx, SettingKind::FramePercentage).await,
            Action::SettingResp => self.setting_resp(ctx).await,
            Action::SnapshotResp => self.snapshot_resp(ctx).await,
            Action::Exit => self.exit(ctx).await,
        }
    }

    async fn start(&self, ctx: &ActionContext) -> Result<Transition> {
        if !self.access.is_authorized(ctx.chat_id) {
            warn!(chat_id = %ctx.chat_id, "Login attempt from unauthorized chat");
            self.notifier
                .send_text(ctx.chat_id, t_lang("not-authorized", ctx.lang()), None)
                .await?;
            return Ok(Transition::to(StateId::NotLogged));
        }

        info!(chat_id = %ctx.chat_id, "Chat logged in");
        let text = format!(
            "👋 {}\n\n{}\n{}",
            t_lang("welcome-title", ctx.lang()),
            t_lang("welcome-logged", ctx.lang()),
            t_lang("welcome-commands", ctx.lang())
        );
        self.notifier
            .send_text(ctx.chat_id, text, Some(create_logged_menu_keyboard(ctx.lang())))
            .await?;
        Ok(Transition::to(StateId::Logged).with_active(true))
    }

    async fn show_settings(&self, ctx: &ActionContext) -> Result<Transition> {
        let settings = self.settings.get().await;
        self.notifier
            .send_text(
                ctx.chat_id,
                format_settings(&settings, ctx.lang()),
                Some(create_settings_keyboard(&settings, ctx.lang())),
            )
            .await?;
        Ok(Transition::to(StateId::Settings))
    }

    async fn toggle(&self, ctx: &ActionContext) -> Result<Transition> {
        let enabled = self.settings.toggle_detection().await;
        info!(chat_id = %ctx.chat_id, detection_enabled = enabled, "Detection toggled");
        self.show_settings(ctx).await
    }

    async fn get_log(&self, ctx: &ActionContext) -> Result<Transition> {
        let text = match &self.log.file {
            None => t_lang("log-unavailable", ctx.lang()),
            Some(path) => {
                let content = read_log_tail(path, LOG_TAIL_BYTES).await?;
                let tail = format_log_tail(&content, self.log.tail_lines);
                if tail.trim().is_empty() {
                    t_lang("log-empty", ctx.lang())
                } else {
                    format!("{}\n\n{}", t_lang("log-title", ctx.lang()), tail)
                }
            }
        };
        self.notifier.send_text(ctx.chat_id, text, None).await?;
        Ok(Transition::to(StateId::Settings))
    }

    async fn ask_value(&self, ctx: &ActionContext, kind: SettingKind) -> Result<Transition> {
        let current = self.settings.get().await.value(kind);
        self.notifier
            .send_text(
                ctx.chat_id,
                t_lang(&format!("picker-{}", kind.name()), ctx.lang()),
                Some(create_value_picker_keyboard(kind, current, ctx.lang())),
            )
            .await?;
        Ok(Transition::to(StateId::RespSettings))
    }

    async fn setting_resp(&self, ctx: &ActionContext) -> Result<Transition> {
        if matches!(ctx.event, EventTag::Click(Click::Exit)) {
            return self.exit(ctx).await;
        }

        let payload = ctx.payload().unwrap_or_default();
        let (kind, value) = parse_setting_payload(payload)?;

        self.settings.set(kind, value).await?;
        info!(chat_id = %ctx.chat_id, setting = kind.name(), value, "Setting updated");
        self.notifier
            .send_text(
                ctx.chat_id,
                t_args_lang(
                    "setting-updated",
                    &[("setting", kind.name()), ("value", &value.to_string())],
                    ctx.lang(),
                ),
                None,
            )
            .await?;
        self.show_settings(ctx).await
    }

    async fn show_snapshot(&self, ctx: &ActionContext) -> Result<Transition> {
        match self.scanner.snapshot().await? {
            Some(frame) => {
                self.notifier
                    .send_image(
                        ctx.chat_id,
                        encode_png(&frame)?,
                        Some(t_lang("snapshot-caption", ctx.lang())),
                        Some(create_snapshot_keyboard(ctx.lang())),
                    )
                    .await?;
            }
            None => {
                self.notifier
                    .send_text(
                        ctx.chat_id,
                        t_lang("snapshot-empty", ctx.lang()),
                        Some(create_snapshot_keyboard(ctx.lang())),
                    )
                    .await?;
            }
        }
        Ok(Transition::stay())
    }

    async fn snapshot_resp(&self, ctx: &ActionContext) -> Result<Transition> {
        match ctx.payload() {
            Some(SCAN_PAYLOAD) => self.run_scan(ctx).await,
            Some(REFRESH_PAYLOAD) => self.show_snapshot(ctx).await,
            other => {
                debug!(chat_id = %ctx.chat_id, payload = ?other, "Ignoring stale click");
                Ok(Transition::stay())
            }
        }
    }

    async fn run_scan(&self, ctx: &ActionContext) -> Result<Transition> {
        let settings = self.settings.get().await;
        self.notifier
            .send_text(ctx.chat_id, t_lang("scan-started", ctx.lang()), None)
            .await?;

        let outcome = self.scanner.scan(settings, None).await?;
        info!(
            chat_id = %ctx.chat_id,
            faces = outcome.faces.len(),
            frames_examined = outcome.frames_examined,
            "Scan completed"
        );

        if outcome.faces.is_empty() {
            self.notifier
                .send_text(ctx.chat_id, t_lang("scan-no-faces", ctx.lang()), None)
                .await?;
            return Ok(Transition::stay());
        }

        let summary = t_args_lang(
            "scan-found",
            &[
                ("count", &outcome.faces.len().to_string()),
                ("frames", &outcome.frames_examined.to_string()),
            ],
            ctx.lang(),
        );
        self.notifier.send_text(ctx.chat_id, summary, None).await?;

        for (i, face) in outcome.faces.iter().enumerate() {
            let caption = t_args_lang("face-caption", &[("index", &(i + 1).to_string())], ctx.lang());
            self.notifier
                .send_image(ctx.chat_id, encode_png(face)?, Some(caption), None)
                .await?;
        }
        Ok(Transition::stay())
    }

    async fn exit(&self, ctx: &ActionContext) -> Result<Transition> {
        debug!(chat_id = %ctx.chat_id, "Closing menus");
        self.notifier
            .send_text(ctx.chat_id, t_lang("goodbye", ctx.lang()), None)
            .await?;
        Ok(Transition::end())
    }
}
