mod actions;
mod appointment_types;
mod call_control_types;
mod config;
mod error;
mod handlers;
mod platform_types;
mod session;
mod tasks;
#[cfg(test)]
mod test_support;
mod tools;
mod types;
mod watchdog;

use crate::actions::ActionClient;
use crate::config::Config;
use crate::consts::REQUEST_TIMEOUT_SECS;
use crate::types::AppState;

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;

pub mod consts {
    pub const GREETING_INSTRUCTIONS: &str = "Greet the caller warmly as the Modera Dental Clinic \
        virtual assistant and ask how you can help them today.";
    pub const IDLE_NUDGE_INSTRUCTIONS: &str =
        "The caller has been quiet for a while. Gently ask if they are still there.";
    pub const IDLE_GOODBYE_INSTRUCTIONS: &str = "The caller has not responded. Politely say \
        goodbye and let them know they can call the clinic back any time.";
    pub const IDLE_HANGUP_REASON: &str = "caller inactive";
    pub const FAREWELL_INSTRUCTIONS: &str =
        "Thank the caller for calling Modera Dental Clinic and say goodbye.";

    pub const APPOINTMENT_TOOL_ID: &str = "create_appointment";
    pub const APPOINTMENT_SOURCE_TAG: &str = "ai_receptionist_voice";
    pub const TRANSFER_PATH: &str = "/twirp/livekit.SIP/TransferSIPParticipant";
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    pub const DEFAULT_FALLBACK_PHONE: &str = "(305) 485-8427";
    pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 15;
    pub const DEFAULT_PROMPT_FILE: &str = "prompt.md";
    pub const DEFAULT_STT_MODEL: &str = "deepgram/nova-3:multi";
    pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-4.1-mini";
    pub const DEFAULT_TTS_MODEL: &str = "cartesia/sonic-3:9626c31c-bec5-4cca-baa8-f8ba9e84c8bc";
    pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

    pub const OUTBOUND_CHANNEL_CAPACITY: usize = 32;
    pub const TOOL_DRAIN_SECS: u32 = 5;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("reqwest", tracing_subscriber::filter::LevelFilter::INFO),
            (
                "clinic_voice_agent",
                tracing_subscriber::filter::LevelFilter::DEBUG,
            ),
        ]));
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;
    let actions = ActionClient::new(http_client.clone(), &config);
    let bind_addr = config.bind_addr;

    let app_state = Arc::new(AppState {
        config,
        http_client,
        actions,
    });
    let app = handlers::router(app_state);

    info!(addr = %bind_addr, "listening for platform sessions");
    axum::Server::bind(&bind_addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
