use crate::actions::ActionClient;
use crate::config::Config;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub actions: ActionClient,
}

/// Which escalation prompt the idle watchdog is due to speak next
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdlePromptLevel {
    #[default]
    None,
    FirstNudge,
    FinalWarning,
}

impl IdlePromptLevel {
    pub fn escalate(self) -> Self {
        match self {
            IdlePromptLevel::None => IdlePromptLevel::FirstNudge,
            IdlePromptLevel::FirstNudge | IdlePromptLevel::FinalWarning => {
                IdlePromptLevel::FinalWarning
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Greeting,
    Active,
    Escalating,
    Terminated,
}

/// Mutable per-call state.  Only ever touched under its mutex, and never across an `.await`.
#[derive(Debug)]
pub struct CallState {
    pub idle_level: IdlePromptLevel,
    pub phase: SessionPhase,
    /// Liveness of the platform connection
    pub connected: bool,
    /// Bumped every time the watchdog is re-armed or cancelled; a watchdog task whose generation
    /// no longer matches has been superseded.
    pub watchdog_generation: u64,
    /// Set once the caller has been handed to a human; nothing re-arms the watchdog after that
    pub transferred: bool,
}

impl CallState {
    pub fn new() -> Self {
        Self {
            idle_level: IdlePromptLevel::None,
            phase: SessionPhase::Greeting,
            connected: true,
            watchdog_generation: 0,
            transferred: false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.connected && self.phase != SessionPhase::Terminated
    }

    pub fn can_arm_watchdog(&self) -> bool {
        self.is_live() && !self.transferred
    }

    /// Claim the right to end the call.  Exactly one caller ever gets `true`.
    pub fn begin_termination(&mut self) -> bool {
        if self.is_live() {
            self.phase = SessionPhase::Terminated;
            true
        } else {
            false
        }
    }

    /// Record that the platform connection is gone.  Returns `false` if it already was.
    pub fn mark_disconnected(&mut self) -> bool {
        let was_connected = self.connected;
        self.connected = false;
        self.phase = SessionPhase::Terminated;
        was_connected
    }
}

impl Default for CallState {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedCallState = Arc<Mutex<CallState>>;

pub fn lock_state(state: &SharedCallState) -> MutexGuard<'_, CallState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
