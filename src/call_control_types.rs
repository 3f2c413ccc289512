use serde::Serialize;

/// A request to move the caller's SIP leg to a human.  Serializes to the body of the platform's
/// `TransferSIPParticipant` call; `reason` is only ever logged.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TransferRequest {
    #[serde(rename = "room_name")]
    pub room: String,
    pub participant_identity: String,
    #[serde(rename = "transfer_to")]
    pub destination: String,
    pub play_dialtone: bool,
    #[serde(skip)]
    pub reason: String,
}
