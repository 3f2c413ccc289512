use crate::consts::{APPOINTMENT_SOURCE_TAG, APPOINTMENT_TOOL_ID};

use serde::{Deserialize, Serialize};

/// Services the clinic books over the phone.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceType {
    #[serde(rename = "Orthodontics Consultation")]
    OrthodonticsConsultation,
    #[serde(rename = "Routine Checkup")]
    RoutineCheckup,
    #[serde(rename = "Dental Implants Consultation")]
    DentalImplantsConsultation,
    #[serde(rename = "Cosmetic Dentistry Consultation")]
    CosmeticDentistryConsultation,
    #[serde(rename = "Teeth Whitening")]
    TeethWhitening,
    #[serde(rename = "Crown Fitting")]
    CrownFitting,
    #[serde(rename = "Root Canal Treatment")]
    RootCanalTreatment,
    #[serde(rename = "New Patient Exam")]
    NewPatientExam,
    #[serde(rename = "Emergency / Same-Day")]
    EmergencySameDay,
}

impl ServiceType {
    pub const ALL: [ServiceType; 9] = [
        ServiceType::OrthodonticsConsultation,
        ServiceType::RoutineCheckup,
        ServiceType::DentalImplantsConsultation,
        ServiceType::CosmeticDentistryConsultation,
        ServiceType::TeethWhitening,
        ServiceType::CrownFitting,
        ServiceType::RootCanalTreatment,
        ServiceType::NewPatientExam,
        ServiceType::EmergencySameDay,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::OrthodonticsConsultation => "Orthodontics Consultation",
            ServiceType::RoutineCheckup => "Routine Checkup",
            ServiceType::DentalImplantsConsultation => "Dental Implants Consultation",
            ServiceType::CosmeticDentistryConsultation => "Cosmetic Dentistry Consultation",
            ServiceType::TeethWhitening => "Teeth Whitening",
            ServiceType::CrownFitting => "Crown Fitting",
            ServiceType::RootCanalTreatment => "Root Canal Treatment",
            ServiceType::NewPatientExam => "New Patient Exam",
            ServiceType::EmergencySameDay => "Emergency / Same-Day",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Customer {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub is_new_customer: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppointmentDetails {
    pub service_type: ServiceType,
    /// ISO-8601, e.g. `2026-02-10T09:00`; passed through to the webhook as given
    pub datetime: String,
    pub reason: String,
    #[serde(default)]
    pub urgency: Urgency,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppointmentRequest {
    pub customer: Customer,
    pub appointment: AppointmentDetails,
}

/// Flat argument list of the `create_appointment` tool, as the dialogue engine sends it.
#[derive(Deserialize, Debug)]
pub struct CreateAppointmentArgs {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub is_new_customer: bool,
    pub service_type: ServiceType,
    pub datetime: String,
    pub reason: String,
    #[serde(default)]
    pub urgency: Urgency,
}

impl From<CreateAppointmentArgs> for AppointmentRequest {
    fn from(args: CreateAppointmentArgs) -> Self {
        Self {
            customer: Customer {
                full_name: args.full_name,
                phone: args.phone,
                email: args.email,
                is_new_customer: args.is_new_customer,
            },
            appointment: AppointmentDetails {
                service_type: args.service_type,
                datetime: args.datetime,
                reason: args.reason,
                urgency: args.urgency,
            },
        }
    }
}

/// Body POSTed to the appointment webhook.
#[derive(Serialize, Debug)]
pub struct WebhookPayload<'a> {
    pub tool: &'static str,
    pub args: &'a AppointmentRequest,
    pub source: &'static str,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(args: &'a AppointmentRequest) -> Self {
        Self {
            tool: APPOINTMENT_TOOL_ID,
            args,
            source: APPOINTMENT_SOURCE_TAG,
        }
    }
}
