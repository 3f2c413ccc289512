use crate::appointment_types::{AppointmentRequest, CreateAppointmentArgs, ServiceType};
use crate::error::ActionError;
use crate::platform_types::ToolDefinition;

use serde::Deserialize;
use serde_json::{json, Value};

pub const CREATE_APPOINTMENT: &str = "create_appointment";
pub const END_CALL: &str = "end_call";
pub const TRANSFER_TO_HUMAN: &str = "transfer_to_human";

/// A tool invocation the dialogue engine asked for, with its arguments already parsed.
#[derive(Debug)]
pub enum ToolInvocation {
    CreateAppointment(AppointmentRequest),
    EndCall { reason: String },
    TransferToHuman { reason: String },
    Unknown(String),
}

#[derive(Deserialize)]
struct ReasonArgs {
    #[serde(default)]
    reason: String,
}

impl ToolInvocation {
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ActionError> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        match name {
            CREATE_APPOINTMENT => {
                let args: CreateAppointmentArgs = serde_json::from_value(arguments)?;
                Ok(ToolInvocation::CreateAppointment(args.into()))
            }
            END_CALL => {
                let ReasonArgs { reason } = serde_json::from_value(arguments)?;
                Ok(ToolInvocation::EndCall { reason })
            }
            TRANSFER_TO_HUMAN => {
                let ReasonArgs { reason } = serde_json::from_value(arguments)?;
                Ok(ToolInvocation::TransferToHuman { reason })
            }
            other => Ok(ToolInvocation::Unknown(other.to_string())),
        }
    }
}

/// Tool schemas advertised to the dialogue engine when the session starts.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    let service_types: Vec<&str> = ServiceType::ALL.iter().map(|s| s.label()).collect();
    vec![
        ToolDefinition {
            name: CREATE_APPOINTMENT,
            description: "Create a new appointment for a patient at the clinic. Call this once \
                          you have collected and confirmed all of the caller's details.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "full_name": {"type": "string", "description": "Patient's first and last name"},
                    "phone": {"type": "string", "description": "Phone number with country code, e.g. +1305xxxxxxx"},
                    "email": {"type": "string", "description": "Patient's email address"},
                    "is_new_customer": {"type": "boolean", "description": "True for a new patient"},
                    "service_type": {"type": "string", "enum": service_types},
                    "datetime": {"type": "string", "description": "ISO-8601 date and time, e.g. 2026-02-10T09:00"},
                    "reason": {"type": "string", "description": "Brief reason for the visit"},
                    "urgency": {"type": "string", "enum": ["Low", "Medium", "High"], "default": "Medium"}
                },
                "required": ["full_name", "phone", "email", "is_new_customer", "service_type", "datetime", "reason"]
            }),
        },
        ToolDefinition {
            name: END_CALL,
            description: "End the call once the caller is done or asks to hang up.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Why the call is ending"}
                },
                "required": ["reason"]
            }),
        },
        ToolDefinition {
            name: TRANSFER_TO_HUMAN,
            description: "Transfer the caller to a member of the clinic's staff when they ask \
                          for a person or need help you cannot give.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Why the caller needs a person"}
                },
                "required": ["reason"]
            }),
        },
    ]
}
