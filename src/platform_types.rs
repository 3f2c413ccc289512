mod inbound {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum ParticipantKind {
        Standard,
        Ingress,
        Egress,
        Sip,
        Agent,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    pub struct Participant {
        pub identity: String,
        pub kind: ParticipantKind,
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct StartMeta {
        pub room: String,
        #[serde(default)]
        pub job_id: Option<String>,
        #[serde(default)]
        pub participants: Vec<Participant>,
    }

    /// Messages the platform sends over the session websocket.
    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "snake_case", tag = "event")]
    pub enum PlatformMessage {
        Start {
            start: StartMeta,
        },
        Transcript {
            text: String,
            is_final: bool,
        },
        ToolCall {
            call_id: String,
            name: String,
            #[serde(default)]
            arguments: serde_json::Value,
        },
        ParticipantJoined {
            participant: Participant,
        },
        ParticipantLeft {
            identity: String,
        },
        Disconnected {
            #[serde(default)]
            reason: Option<String>,
        },
    }
}
pub use inbound::*;

mod outbound {
    use crate::config::ModelConfig;

    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum NoiseCancellation {
        Bvc,
        BvcTelephony,
    }

    #[derive(Serialize, Clone, Debug)]
    pub struct ToolDefinition {
        pub name: &'static str,
        pub description: &'static str,
        pub parameters: serde_json::Value,
    }

    #[derive(Serialize, Clone, Debug)]
    pub struct SessionOptions {
        pub instructions: String,
        pub models: ModelConfig,
        pub tools: Vec<ToolDefinition>,
        pub noise_cancellation: NoiseCancellation,
    }

    /// Instructions we send back to the platform.  `Hangup` asks the platform to finish any queued
    /// speech and then delete the room.
    #[derive(Serialize, Clone, Debug)]
    #[serde(rename_all = "snake_case", tag = "event")]
    pub enum PlatformOutbound {
        Configure { options: SessionOptions },
        GenerateReply { instructions: String },
        ToolResult { call_id: String, output: String },
        Hangup { reason: String },
    }
}
pub use outbound::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_sip_caller() {
        let json = r#"{
            "event": "start",
            "start": {
                "room": "call-_+13055550100_abc",
                "job_id": "AJ_123",
                "participants": [
                    {"identity": "agent-1", "kind": "agent"},
                    {"identity": "sip_+13055550100", "kind": "sip"}
                ]
            }
        }"#;
        match serde_json::from_str::<PlatformMessage>(json).unwrap() {
            PlatformMessage::Start { start } => {
                assert_eq!(start.room, "call-_+13055550100_abc");
                assert_eq!(start.participants.len(), 2);
                assert_eq!(start.participants[1].kind, ParticipantKind::Sip);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn tool_call_arguments_default_to_null() {
        let json = r#"{"event": "tool_call", "call_id": "c1", "name": "end_call"}"#;
        match serde_json::from_str::<PlatformMessage>(json).unwrap() {
            PlatformMessage::ToolCall { arguments, .. } => assert!(arguments.is_null()),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn outbound_messages_are_tagged() {
        let msg = PlatformOutbound::GenerateReply {
            instructions: "Say hello".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "generate_reply");
        assert_eq!(value["instructions"], "Say hello");
    }
}
