use crate::appointment_types::{AppointmentRequest, WebhookPayload};
use crate::call_control_types::TransferRequest;
use crate::config::Config;
use crate::consts::TRANSFER_PATH;
use crate::error::ActionError;
use crate::platform_types::{Participant, ParticipantKind};

use tracing::{error, info, warn};

/// Client for the two side effects the dialogue engine can trigger.  Every request is bounded by
/// the `reqwest::Client` timeout; nothing is retried.
#[derive(Clone)]
pub struct ActionClient {
    http_client: reqwest::Client,
    webhook_url: String,
    transfer_destination: Option<String>,
    call_control_url: Option<String>,
    call_control_token: Option<String>,
    fallback_phone: String,
}

impl ActionClient {
    pub fn new(http_client: reqwest::Client, config: &Config) -> Self {
        Self {
            http_client,
            webhook_url: config.appointment_webhook_url.clone(),
            transfer_destination: config.transfer_destination.clone(),
            call_control_url: config.call_control_url.clone(),
            call_control_token: config.call_control_token.clone(),
            fallback_phone: config.fallback_phone.clone(),
        }
    }

    pub fn fallback_phone(&self) -> &str {
        &self.fallback_phone
    }

    pub async fn book_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> Result<String, ActionError> {
        let customer = &request.customer;
        let appointment = &request.appointment;
        info!(
            service = appointment.service_type.label(),
            datetime = %appointment.datetime,
            urgency = ?appointment.urgency,
            "creating appointment"
        );

        let resp = self
            .http_client
            .post(&self.webhook_url)
            .json(&WebhookPayload::new(request))
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send appointment webhook request");
                ActionError::TransportFailure(e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            error!(status=%status, "appointment webhook rejected booking");
            return Err(ActionError::RemoteRejected(status));
        }

        Ok(format!(
            "Appointment successfully scheduled for {} on {}. A confirmation will be sent to {}.",
            customer.full_name, appointment.datetime, customer.phone
        ))
    }

    /// Transfer the caller's SIP leg to the clinic's staff line.  Preconditions are checked before
    /// any request goes out.
    pub async fn transfer_call(
        &self,
        room: &str,
        participants: &[Participant],
        reason: &str,
    ) -> Result<String, ActionError> {
        let caller = participants
            .iter()
            .find(|p| p.kind == ParticipantKind::Sip)
            .ok_or_else(|| {
                warn!(room, "no SIP participant to transfer");
                ActionError::PreconditionUnmet("no SIP participant in room")
            })?;
        let destination = self.transfer_destination.as_ref().ok_or_else(|| {
            warn!("transfer requested but no transfer number is configured");
            ActionError::PreconditionUnmet("transfer destination not configured")
        })?;
        let base_url = self.call_control_url.as_ref().ok_or_else(|| {
            warn!("transfer requested but no call control endpoint is configured");
            ActionError::PreconditionUnmet("call control not configured")
        })?;

        let request = TransferRequest {
            room: room.to_string(),
            participant_identity: caller.identity.clone(),
            destination: destination.clone(),
            play_dialtone: true,
            reason: reason.to_string(),
        };
        info!(
            room = %request.room,
            participant = %request.participant_identity,
            destination = %request.destination,
            reason = %request.reason,
            "transferring caller"
        );

        let mut rq = self
            .http_client
            .post(format!("{base_url}{TRANSFER_PATH}"))
            .json(&request);
        if let Some(token) = &self.call_control_token {
            rq = rq.bearer_auth(token);
        }
        let resp = rq.send().await.map_err(|e| {
            error!(error=%e, "failed to send transfer request");
            ActionError::TransportFailure(e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            error!(status=%status, "call control rejected transfer");
            return Err(ActionError::RemoteRejected(status));
        }

        Ok("I'm transferring you to a member of our team now. Please stay on the line.".to_string())
    }
}

/// What the caller hears when a booking fails.
pub fn booking_apology(err: &ActionError, fallback_phone: &str) -> String {
    match err {
        ActionError::RemoteRejected(status) => format!(
            "I apologize, but I was unable to complete the booking at this moment. Please try \
             again or call us directly at {fallback_phone}. Error: {}",
            status.as_u16()
        ),
        ActionError::AlreadyTerminated => "The call has already ended.".to_string(),
        ActionError::PreconditionUnmet(_)
        | ActionError::TransportFailure(_)
        | ActionError::InvalidArguments(_) => format!(
            "I apologize, but there was an issue scheduling the appointment. Please call us \
             directly at {fallback_phone} to complete your booking."
        ),
    }
}

/// What the caller hears when a transfer fails.
pub fn transfer_apology(err: &ActionError, fallback_phone: &str) -> String {
    match err {
        ActionError::PreconditionUnmet(_) => format!(
            "I'm sorry, I'm not able to transfer this call right now. Please call us directly at \
             {fallback_phone} and a member of our team will help you."
        ),
        ActionError::AlreadyTerminated => "The call has already ended.".to_string(),
        ActionError::RemoteRejected(_)
        | ActionError::TransportFailure(_)
        | ActionError::InvalidArguments(_) => format!(
            "I'm sorry, the transfer could not be completed. Please call us directly at \
             {fallback_phone}."
        ),
    }
}
