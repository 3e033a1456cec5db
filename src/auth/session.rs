//! Session state machine
//!
//! A pure reducer: the next state depends only on the current state and the
//! event. All I/O lives in the resolver, which is the only caller.

use serde::Serialize;

/// Lifecycle phase of the app session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No decision has been made yet
    Initializing,
    /// No active account
    Unauthenticated,
    /// An account is active and bootstrapped
    Authenticated,
}

/// Snapshot of the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub active_handle: Option<String>,
}

impl SessionState {
    /// State at process start
    pub fn initial() -> Self {
        Self {
            phase: SessionPhase::Initializing,
            active_handle: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// Returns true if `handle` is the active account (case-insensitive)
    pub fn is_active(&self, handle: &str) -> bool {
        self.active_handle
            .as_deref()
            .is_some_and(|active| active.eq_ignore_ascii_case(handle))
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Events accepted by [`reduce`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Init,
    InitDone,
    LoginSuccess(String),
    LogoutAll,
}

/// Computes the state that follows `event`
pub fn reduce(state: &SessionState, event: SessionEvent) -> SessionState {
    match event {
        SessionEvent::Init => SessionState {
            phase: SessionPhase::Initializing,
            active_handle: state.active_handle.clone(),
        },
        SessionEvent::InitDone | SessionEvent::LogoutAll => SessionState {
            phase: SessionPhase::Unauthenticated,
            active_handle: None,
        },
        SessionEvent::LoginSuccess(handle) => SessionState {
            phase: SessionPhase::Authenticated,
            active_handle: Some(handle),
        },
    }
}
