//! The hierarchical transition function.
//!
//! A session's position is its active path: a stack of [`Frame`]s from the
//! top level down to the deepest level it has entered. Resolution tries the
//! deepest frame first and walks upward; applying a transition settles the
//! reported state at the level that produced it, cascading through remap
//! tables toward the top. Both operations are pure.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::event::EventTag;
use super::level::{Action, Entry, Level, LevelId, StateId};

/// Root level of every tree
pub const ROOT: LevelId = LevelId(0);

/// One element of the active path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub level: LevelId,
    pub state: StateId,
}

/// Outcome of resolving an event against an active path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// Depth of the level that owns the matched binding
    pub depth: usize,
    pub level: LevelId,
    pub action: Action,
    /// The path the event was resolved against, after the authorization gate
    pub path: Vec<Frame>,
}

impl Resolved {
    /// Whether the matched binding was an entry point of a level not yet on the path
    pub fn enters_level(&self) -> bool {
        self.depth == self.path.len()
    }
}

/// Array of levels, the first being the root
#[derive(Clone, Debug)]
pub struct ConversationTree {
    levels: Vec<Level>,
    initial: StateId,
}

impl ConversationTree {
    pub fn new(levels: Vec<Level>, initial: StateId) -> Self {
        Self { levels, initial }
    }

    pub fn level(&self, id: LevelId) -> &Level {
        &self.levels[id.0]
    }

    /// Path of a session on first contact
    pub fn initial_path(&self) -> Vec<Frame> {
        vec![Frame {
            level: ROOT,
            state: self.initial,
        }]
    }

    /// Apply authorization gates: the first guarded frame of an inactive
    /// session is replaced by its redirect state and everything below it is cut.
    pub fn effective_path(&self, path: &[Frame], is_active: bool) -> Vec<Frame> {
        let mut effective = Vec::with_capacity(path.len());
        for frame in path {
            if let Some(gate) = self.level(frame.level).gate_rule() {
                if !is_active && frame.state == gate.guarded {
                    effective.push(Frame {
                        level: frame.level,
                        state: gate.redirect,
                    });
                    return effective;
                }
            }
            effective.push(*frame);
        }
        effective
    }

    /// Find the binding that handles `event`, deepest level first.
    ///
    /// Returns `None` when no reachable level has a matching binding.
    pub fn resolve(&self, path: &[Frame], is_active: bool, event: &EventTag) -> Option<Resolved> {
        let path = self.effective_path(path, is_active);

        if path.is_empty() {
            let action = self
                .level(ROOT)
                .entry_points()
                .iter()
                .find(|binding| binding.matches(event))?
                .action;
            return Some(Resolved {
                depth: 0,
                level: ROOT,
                action,
                path,
            });
        }

        for depth in (0..path.len()).rev() {
            let frame = path[depth];
            let level = self.level(frame.level);
            let active_child = path.get(depth + 1).map(|below| below.level);

            for entry in level.entries(frame.state) {
                match entry {
                    Entry::Bind(binding) if binding.matches(event) => {
                        return Some(Resolved {
                            depth,
                            level: frame.level,
                            action: binding.action,
                            path,
                        });
                    }
                    Entry::Child(child) if Some(*child) != active_child => {
                        let entered = self
                            .level(*child)
                            .entry_points()
                            .iter()
                            .find(|binding| binding.matches(event));
                        if let Some(binding) = entered {
                            let action = binding.action;
                            return Some(Resolved {
                                depth: depth + 1,
                                level: *child,
                                action,
                                path: path[..=depth].to_vec(),
                            });
                        }
                    }
                    _ => {}
                }
            }

            if let Some(binding) = level.fallbacks().iter().find(|b| b.matches(event)) {
                return Some(Resolved {
                    depth,
                    level: frame.level,
                    action: binding.action,
                    path,
                });
            }
        }

        None
    }

    /// Compute the path after the resolved action reported `next`.
    pub fn apply(&self, resolved: &Resolved, is_active: bool, next: Option<StateId>) -> Vec<Frame> {
        let mut path = resolved.path.clone();
        if path.is_empty() {
            path = self.initial_path();
        }

        if let Some(state) = next {
            self.settle(&mut path, resolved.depth, resolved.level, state);
        }

        if path.is_empty() {
            path = self.initial_path();
        }
        self.effective_path(&path, is_active)
    }

    fn settle(&self, path: &mut Vec<Frame>, depth: usize, level_id: LevelId, state: StateId) {
        let level = self.level(level_id);

        if depth > 0 {
            if let Some(parent_state) = level.remap(state) {
                path.truncate(depth);
                let parent = path[depth - 1].level;
                self.settle(path, depth - 1, parent, parent_state);
                return;
            }
            if state == StateId::End {
                // Unmapped end: the level is left, the parent keeps its state.
                path.truncate(depth);
                return;
            }
        }

        let state = if depth == 0 {
            level.remap(state).unwrap_or(state)
        } else {
            state
        };

        if state == StateId::End {
            path.clear();
            return;
        }

        if level.owns(state) {
            path.truncate(depth);
            path.push(Frame {
                level: level_id,
                state,
            });
            return;
        }

        if let Some(current) = path.get(depth).filter(|frame| frame.level == level_id) {
            let current = current.state;
            let owner = level
                .children(current)
                .find(|child| self.level(*child).owns(state));
            if let Some(child) = owner {
                path.truncate(depth + 1);
                path.push(Frame {
                    level: child,
                    state,
                });
                return;
            }
        }

        warn!(
            level = level.name(),
            state = ?state,
            "Transition to a state the level does not own, ignoring"
        );
    }
}
