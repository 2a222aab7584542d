//! Reducer for the create/edit form state of the admin page.

use shared::domain::Entity;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Idle,
    Creating,
    Editing,
}

/// Which form, if any, is open. Only `Editing` carries a target.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EditSession {
    #[default]
    Idle,
    Creating,
    Editing(Entity),
}

#[derive(Debug, Clone)]
pub enum SessionAction {
    StartCreate,
    StartUpdate(Entity),
    Close,
}

impl SessionAction {
    pub fn name(&self) -> &'static str {
        match self {
            SessionAction::StartCreate => "start_create",
            SessionAction::StartUpdate(_) => "start_update",
            SessionAction::Close => "close",
        }
    }
}

impl EditSession {
    pub fn mode(&self) -> EditMode {
        match self {
            EditSession::Idle => EditMode::Idle,
            EditSession::Creating => EditMode::Creating,
            EditSession::Editing(_) => EditMode::Editing,
        }
    }

    pub fn target(&self) -> Option<&Entity> {
        match self {
            EditSession::Editing(target) => Some(target),
            EditSession::Idle | EditSession::Creating => None,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, EditSession::Idle)
    }

    /// Every action is accepted from every state.
    pub fn reduce(self, action: SessionAction) -> EditSession {
        match action {
            SessionAction::StartCreate => EditSession::Creating,
            SessionAction::StartUpdate(entity) => EditSession::Editing(entity),
            SessionAction::Close => EditSession::Idle,
        }
    }
}

/// Observable holder of the current [`EditSession`].
pub struct SessionStore {
    state: watch::Sender<EditSession>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(EditSession::Idle);
        Self { state }
    }

    pub fn dispatch(&self, action: SessionAction) -> EditSession {
        let name = action.name();
        self.state.send_modify(|session| {
            let previous = std::mem::take(session);
            *session = previous.reduce(action);
        });
        let current = self.current();
        debug!(action = name, mode = ?current.mode(), "edit session transition");
        current
    }

    pub fn current(&self) -> EditSession {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EditSession> {
        self.state.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/edit_session_tests.rs"]
mod tests;
