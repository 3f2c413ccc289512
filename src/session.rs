use crate::actions::{booking_apology, transfer_apology, ActionClient};
use crate::appointment_types::AppointmentRequest;
use crate::consts::{FAREWELL_INSTRUCTIONS, GREETING_INSTRUCTIONS, TOOL_DRAIN_SECS};
use crate::error::{ActionError, AppError};
use crate::platform_types::{
    NoiseCancellation, Participant, ParticipantKind, PlatformMessage, PlatformOutbound,
    SessionOptions, StartMeta,
};
use crate::tools::{tool_definitions, ToolInvocation};
use crate::types::{lock_state, AppState, CallState, SharedCallState};
use crate::watchdog::IdleWatchdog;

use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// One live phone call, driven by the platform's event stream.
pub struct CallSession {
    pub session_id: Uuid,
    pub room: String,
    /// Everyone currently in the room, as last reported by the platform
    pub participants: Vec<Participant>,
    pub call_state: SharedCallState,
    pub watchdog: Arc<IdleWatchdog>,
    /// Tool invocations in flight or finished during this call
    pub join_handles: Vec<task::JoinHandle<()>>,
    /// Sink by which we send instructions to the outbound websocket funnel
    pub outbound_sink: mpsc::Sender<PlatformOutbound>,
    pub app_state: Arc<AppState>,
}

impl CallSession {
    /// Configure the platform's pipeline, greet the caller and arm the idle watchdog.
    pub async fn start(
        session_id: Uuid,
        start_meta: StartMeta,
        outbound_sink: mpsc::Sender<PlatformOutbound>,
        app_state: Arc<AppState>,
    ) -> Result<Self, AppError> {
        let call_state = Arc::new(Mutex::new(CallState::new()));
        let watchdog = Arc::new(IdleWatchdog::new(
            app_state.config.idle_timeout,
            call_state.clone(),
            outbound_sink.clone(),
        ));
        let session = Self {
            session_id,
            room: start_meta.room,
            participants: start_meta.participants,
            call_state,
            watchdog,
            join_handles: vec![],
            outbound_sink,
            app_state,
        };

        session
            .send(PlatformOutbound::Configure {
                options: session.session_options(),
            })
            .await?;
        session
            .send(PlatformOutbound::GenerateReply {
                instructions: GREETING_INSTRUCTIONS.to_string(),
            })
            .await?;
        session.watchdog.start();
        info!(
            session_id = %session.session_id,
            caller = ?session.caller_identity(),
            "session started"
        );

        Ok(session)
    }

    pub fn caller_identity(&self) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.kind == ParticipantKind::Sip)
            .map(|p| p.identity.as_str())
    }

    fn session_options(&self) -> SessionOptions {
        let noise_cancellation = if self.caller_identity().is_some() {
            NoiseCancellation::BvcTelephony
        } else {
            NoiseCancellation::Bvc
        };
        SessionOptions {
            instructions: self.app_state.config.instructions.clone(),
            models: self.app_state.config.models.clone(),
            tools: tool_definitions(),
            noise_cancellation,
        }
    }

    async fn send(&self, msg: PlatformOutbound) -> Result<(), AppError> {
        self.outbound_sink.send(msg).await.map_err(|e| {
            error!(error=%e, "failed to send platform outbound message through channel");
            AppError("Error sending platform outbound through channel")
        })
    }

    pub async fn handle_platform_message(&mut self, msg: PlatformMessage) -> Result<(), AppError> {
        match msg {
            PlatformMessage::Transcript { text, is_final } => {
                self.on_transcript(&text, is_final);
                Ok(())
            }
            PlatformMessage::ToolCall {
                call_id,
                name,
                arguments,
            } => {
                self.on_tool_call(call_id, name, arguments);
                Ok(())
            }
            PlatformMessage::ParticipantJoined { participant } => {
                debug!(participant = ?participant, "participant joined");
                self.participants.retain(|p| p.identity != participant.identity);
                self.participants.push(participant);
                Ok(())
            }
            PlatformMessage::ParticipantLeft { identity } => {
                debug!(identity = %identity, "participant left");
                self.participants.retain(|p| p.identity != identity);
                Ok(())
            }
            PlatformMessage::Disconnected { reason } => {
                self.on_disconnect(reason.as_deref());
                Ok(())
            }
            PlatformMessage::Start { .. } => Err(AppError(
                "Got a second start message in the middle of a session",
            )),
        }
    }

    /// Finalized caller speech resets the idle escalation; interim results never do.
    pub fn on_transcript(&self, text: &str, is_final: bool) {
        if !is_final {
            trace!(transcript = %text, "interim transcript");
            return;
        }
        // finalized silence is still silence
        if text.trim().is_empty() {
            return;
        }
        debug!(transcript = %text, "final transcript");
        if !self.watchdog.restart() {
            debug!("call over or transferred; not re-arming idle watchdog");
        }
    }

    pub fn on_tool_call(&mut self, call_id: String, name: String, arguments: Value) {
        debug!(call_id = %call_id, tool = %name, "tool call");
        let ctx = ToolContext {
            room: self.room.clone(),
            participants: self.participants.clone(),
            call_state: self.call_state.clone(),
            watchdog: self.watchdog.clone(),
            outbound_sink: self.outbound_sink.clone(),
            actions: self.app_state.actions.clone(),
        };
        let handle = tokio::spawn(run_tool(ctx, call_id, name, arguments));
        self.join_handles.retain(|h| !h.is_finished());
        self.join_handles.push(handle);
    }

    pub fn on_disconnect(&self, reason: Option<&str>) {
        let first = lock_state(&self.call_state).mark_disconnected();
        self.watchdog.cancel();
        if first {
            info!(reason = ?reason, "call disconnected");
        }
    }

    /// Give in-flight tool calls a bounded amount of time to finish once the call is over.
    pub async fn wait_for_tools(&mut self) {
        let mut tries = 0;
        while tries < TOOL_DRAIN_SECS {
            if self.join_handles.iter().all(|h| h.is_finished()) {
                break;
            }
            tries += 1;
            sleep(Duration::from_secs(1)).await;
        }
        let pending = self.join_handles.iter().filter(|h| !h.is_finished()).count();
        if pending > 0 {
            warn!(pending, "tool calls still running at end of session");
        }
    }
}

/// What a tool task needs from its session; tool tasks never hold the session itself.
struct ToolContext {
    room: String,
    participants: Vec<Participant>,
    call_state: SharedCallState,
    watchdog: Arc<IdleWatchdog>,
    outbound_sink: mpsc::Sender<PlatformOutbound>,
    actions: ActionClient,
}

impl ToolContext {
    fn ensure_live(&self) -> Result<(), ActionError> {
        if lock_state(&self.call_state).is_live() {
            Ok(())
        } else {
            Err(ActionError::AlreadyTerminated)
        }
    }

    async fn create_appointment(&self, request: &AppointmentRequest) -> String {
        let res = match self.ensure_live() {
            Ok(()) => self.actions.book_appointment(request).await,
            Err(e) => Err(e),
        };
        res.unwrap_or_else(|e| booking_apology(&e, self.actions.fallback_phone()))
    }

    async fn transfer_to_human(&self, reason: &str) -> String {
        let res = match self.ensure_live() {
            Ok(()) => {
                self.actions
                    .transfer_call(&self.room, &self.participants, reason)
                    .await
            }
            Err(e) => Err(e),
        };
        match res {
            Ok(confirmation) => {
                // the caller is on their way out; don't nudge them during the dial tone
                lock_state(&self.call_state).transferred = true;
                self.watchdog.cancel();
                confirmation
            }
            Err(e) => transfer_apology(&e, self.actions.fallback_phone()),
        }
    }

    /// Speak a farewell and have the platform tear the room down.  Only the first termination
    /// path to claim the call gets here; the rest see `AlreadyTerminated`.
    async fn end_call(&self, reason: &str) -> Result<(), ActionError> {
        if !lock_state(&self.call_state).begin_termination() {
            return Err(ActionError::AlreadyTerminated);
        }
        self.watchdog.cancel();
        info!(reason = %reason, "ending call");

        let farewell = PlatformOutbound::GenerateReply {
            instructions: FAREWELL_INSTRUCTIONS.to_string(),
        };
        let hangup = PlatformOutbound::Hangup {
            reason: reason.to_string(),
        };
        if self.outbound_sink.send(farewell).await.is_err()
            || self.outbound_sink.send(hangup).await.is_err()
        {
            debug!("connection closed while ending call");
        }
        Ok(())
    }
}

async fn run_tool(ctx: ToolContext, call_id: String, name: String, arguments: Value) {
    let output = match ToolInvocation::parse(&name, arguments) {
        Ok(ToolInvocation::CreateAppointment(request)) => ctx.create_appointment(&request).await,
        Ok(ToolInvocation::TransferToHuman { reason }) => ctx.transfer_to_human(&reason).await,
        Ok(ToolInvocation::EndCall { reason }) => {
            if let Err(e) = ctx.end_call(&reason).await {
                debug!(error = %e, "end_call ignored");
            }
            return;
        }
        Ok(ToolInvocation::Unknown(name)) => {
            warn!(tool = %name, "dialogue engine asked for an unknown tool");
            format!("The tool {name} is not available.")
        }
        Err(e) => {
            warn!(tool = %name, error = %e, "failed to parse tool arguments");
            format!(
                "The arguments for {name} were invalid. Confirm the details with the caller and \
                 try again."
            )
        }
    };

    let result = PlatformOutbound::ToolResult { call_id, output };
    if ctx.outbound_sink.send(result).await.is_err() {
        debug!(tool = %name, "call ended before tool result could be delivered");
    }
}
