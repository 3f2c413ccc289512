use crate::consts::{IDLE_GOODBYE_INSTRUCTIONS, IDLE_HANGUP_REASON, IDLE_NUDGE_INSTRUCTIONS};
use crate::platform_types::PlatformOutbound;
use crate::types::{lock_state, IdlePromptLevel, SessionPhase, SharedCallState};

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why a watchdog task stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogExit {
    /// Cancelled, or replaced by a newer task
    Superseded,
    /// The call ended some other way before the watchdog woke
    CallEnded,
    /// The outbound channel was closed while we tried to speak
    ConnectionClosed,
    /// Both prompts were spoken and the call was hung up
    Escalated,
}

struct WatchdogTask {
    generation: u64,
    cancel: CancellationToken,
    handle: task::JoinHandle<WatchdogExit>,
}

/// Single-owner slot holding at most one live idle timer for a call.
///
/// All replacement goes through `slot`; the generation stored in the shared `CallState` is bumped
/// under the same critical section, so a task that wakes after being superseded sees the mismatch
/// before it can touch the idle level or speak.
pub struct IdleWatchdog {
    threshold: Duration,
    call_state: SharedCallState,
    outbound: mpsc::Sender<PlatformOutbound>,
    slot: Mutex<Option<WatchdogTask>>,
}

impl IdleWatchdog {
    pub fn new(
        threshold: Duration,
        call_state: SharedCallState,
        outbound: mpsc::Sender<PlatformOutbound>,
    ) -> Self {
        Self {
            threshold,
            call_state,
            outbound,
            slot: Mutex::new(None),
        }
    }

    /// Arm the watchdog, keeping the current idle level.  Returns `false` if the call is over.
    pub fn start(&self) -> bool {
        self.arm(false)
    }

    /// Reset the idle level and replace any running timer with a fresh one.
    pub fn restart(&self) -> bool {
        self.arm(true)
    }

    pub fn cancel(&self) {
        let mut slot = self.lock_slot();
        lock_state(&self.call_state).watchdog_generation += 1;
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
            debug!(generation = previous.generation, "idle watchdog cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.lock_slot()
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    fn arm(&self, reset_level: bool) -> bool {
        let mut slot = self.lock_slot();
        let generation = {
            let mut state = lock_state(&self.call_state);
            // a call that is over, or already with a human, keeps whatever task it has
            if !state.can_arm_watchdog() {
                return false;
            }
            state.watchdog_generation += 1;
            if reset_level {
                state.idle_level = IdlePromptLevel::None;
            }
            if matches!(state.phase, SessionPhase::Greeting | SessionPhase::Escalating) {
                state.phase = SessionPhase::Active;
            }
            state.watchdog_generation
        };
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(watch(
            self.threshold,
            self.call_state.clone(),
            self.outbound.clone(),
            generation,
            cancel.clone(),
        ));
        *slot = Some(WatchdogTask {
            generation,
            cancel,
            handle,
        });

        true
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<WatchdogTask>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for IdleWatchdog {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.take() {
            task.cancel.cancel();
        }
    }
}

async fn watch(
    threshold: Duration,
    call_state: SharedCallState,
    outbound: mpsc::Sender<PlatformOutbound>,
    generation: u64,
    cancel: CancellationToken,
) -> WatchdogExit {
    let exit = loop {
        tokio::select! {
            _ = cancel.cancelled() => break WatchdogExit::Superseded,
            _ = sleep(threshold) => {}
        }

        let level = {
            let mut state = lock_state(&call_state);
            if cancel.is_cancelled() || state.watchdog_generation != generation {
                break WatchdogExit::Superseded;
            }
            if !state.is_live() {
                break WatchdogExit::CallEnded;
            }
            state.idle_level = state.idle_level.escalate();
            if state.idle_level == IdlePromptLevel::FinalWarning {
                state.begin_termination();
            } else {
                state.phase = SessionPhase::Escalating;
            }
            state.idle_level
        };

        if level == IdlePromptLevel::FirstNudge {
            info!(?threshold, "caller idle; nudging");
            if let Err(exit) = speak(&outbound, &cancel, IDLE_NUDGE_INSTRUCTIONS).await {
                break exit;
            }
            continue;
        }

        // termination is claimed, so the goodbye and hangup go out whatever happens to the token
        info!(?threshold, "caller still idle; ending call");
        let goodbye = PlatformOutbound::GenerateReply {
            instructions: IDLE_GOODBYE_INSTRUCTIONS.to_string(),
        };
        if outbound.send(goodbye).await.is_err() {
            break WatchdogExit::ConnectionClosed;
        }
        let hangup = PlatformOutbound::Hangup {
            reason: IDLE_HANGUP_REASON.to_string(),
        };
        if outbound.send(hangup).await.is_err() {
            break WatchdogExit::ConnectionClosed;
        }
        break WatchdogExit::Escalated;
    };

    debug!(generation, exit = ?exit, "idle watchdog stopped");
    exit
}

/// Hand a prompt to the dialogue engine, unless we are cancelled first.  A closed channel means
/// the call is gone, which is a normal way to stop.
async fn speak(
    outbound: &mpsc::Sender<PlatformOutbound>,
    cancel: &CancellationToken,
    instructions: &str,
) -> Result<(), WatchdogExit> {
    let msg = PlatformOutbound::GenerateReply {
        instructions: instructions.to_string(),
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WatchdogExit::Superseded),
        res = outbound.send(msg) => res.map_err(|_| WatchdogExit::ConnectionClosed),
    }
}
