//! Pure model of an authorized chat's conversation position.
//!
//! `reported` mirrors the transitions `ActionDispatcher::run` returns when
//! every collaborator succeeds. `test_router_agrees_with_walk` in
//! `router_tests.rs` replays the same events through the real router and
//! compares paths step by step, so a drift in either one fails there.

use facewatch::conversation::{
    build_conversation, Action, Click, ConversationTree, EventTag, Frame, StateId, Transition,
};
use facewatch::settings::parse_setting_payload;

/// Session position as the router keeps it
pub struct Walk {
    pub tree: ConversationTree,
    pub path: Vec<Frame>,
    pub is_active: bool,
}

impl Walk {
    pub fn new() -> Self {
        let tree = build_conversation();
        let path = tree.initial_path();
        Self {
            tree,
            path,
            is_active: false,
        }
    }

    pub fn state(&self) -> StateId {
        self.path.last().map(|f| f.state).unwrap_or(StateId::NotLogged)
    }

    /// Feed one event, with actions reporting what the authorized bot reports
    pub fn send(&mut self, event: EventTag) -> Option<Action> {
        let resolved = self.tree.resolve(&self.path, self.is_active, &event)?;
        let transition = reported(resolved.action, &event);
        if let Some(active) = transition.activate {
            self.is_active = active;
        }
        self.path = self.tree.apply(&resolved, self.is_active, transition.next);
        Some(resolved.action)
    }
}

/// Transition each action reports for an authorized chat
pub fn reported(action: Action, event: &EventTag) -> Transition {
    match action {
        Action::Start => Transition::to(StateId::Logged).with_active(true),
        Action::ShowLoggedMenu | Action::ShowSettings | Action::Toggle | Action::GetLog => {
            Transition::to(StateId::Settings)
        }
        Action::FaceNumber | Action::SecondsToAnalyze | Action::FramePercentage => {
            Transition::to(StateId::RespSettings)
        }
        Action::SettingResp => match event.as_click() {
            Some(Click::Exit) => Transition::end(),
            Some(click) if parse_setting_payload(click.payload()).is_ok() => {
                Transition::to(StateId::Settings)
            }
            _ => Transition::end(),
        },
        Action::ShowSnapshot | Action::SnapshotResp => Transition::stay(),
        Action::Exit => Transition::end(),
    }
}
