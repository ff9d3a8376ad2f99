//! Session lifecycle state machine.

use plumber_primitives::SessionId;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// States a session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// Context assembled; nothing has run yet.
    Init,
    /// On-load scripts are running.
    Loading,
    /// On-load finished; the host is interacting with the environment.
    Active,
    /// On-exit scripts are running.
    Exiting,
    /// Session finished; nothing else will run.
    Terminated,
}

impl SessionState {
    /// Returns `true` while exit scripts are still owed.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Init | Self::Loading | Self::Active)
    }

    /// Returns `true` once the session has terminated.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Events that trigger lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Start running on-load scripts.
    Load,
    /// On-load completed.
    Activate,
    /// Leave normally (or after an on-load failure) and run exit scripts.
    Exit,
    /// Exit scripts finished.
    Terminate,
    /// Host requested termination.
    Abort,
}

/// Lifecycle state manager.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    session_id: SessionId,
    state: SessionState,
}

impl Lifecycle {
    /// Constructs a lifecycle controller for the given session.
    #[must_use]
    pub const fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: SessionState::Init,
        }
    }

    /// Returns the owning session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Applies a lifecycle event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the supplied event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: SessionEvent) -> LifecycleResult<SessionState> {
        let next = match (self.state, event) {
            (SessionState::Init, SessionEvent::Load) => Some(SessionState::Loading),
            (SessionState::Loading, SessionEvent::Activate) => Some(SessionState::Active),
            (SessionState::Loading | SessionState::Active, SessionEvent::Exit)
            | (
                SessionState::Init
                | SessionState::Loading
                | SessionState::Active
                | SessionState::Exiting,
                SessionEvent::Abort,
            ) => Some(SessionState::Exiting),
            (SessionState::Exiting | SessionState::Terminated, SessionEvent::Terminate)
            | (SessionState::Terminated, SessionEvent::Abort) => Some(SessionState::Terminated),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                session_id: self.session_id,
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            debug!(
                session_id = %self.session_id,
                ?self.state,
                ?next_state,
                ?event,
                "session lifecycle transition"
            );
            self.state = next_state;
        }

        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid lifecycle transition from {from:?} via {event:?} for session {session_id}")]
    InvalidTransition {
        /// Identifier of the session whose transition failed.
        session_id: SessionId,
        /// State prior to the attempted transition.
        from: SessionState,
        /// Event that triggered the failure.
        event: SessionEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
