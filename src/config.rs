use crate::consts::{
    DEFAULT_BIND_ADDR, DEFAULT_FALLBACK_PHONE, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_LLM_MODEL,
    DEFAULT_PROMPT_FILE, DEFAULT_STT_MODEL, DEFAULT_TTS_MODEL,
};
use crate::error::ConfigError;

use serde::Serialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

/// Model identifiers handed to the platform's speech pipeline.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ModelConfig {
    pub stt: String,
    pub llm: String,
    pub tts: String,
}

/// Everything the agent needs at runtime, read and normalized once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub appointment_webhook_url: String,
    /// `tel:`/`sip:` URI the caller is transferred to.  Absent means transfers fail at invocation.
    pub transfer_destination: Option<String>,
    /// Number read out to callers whenever an action fails
    pub fallback_phone: String,
    pub call_control_url: Option<String>,
    pub call_control_token: Option<String>,
    pub idle_timeout: Duration,
    /// Dialogue engine instructions, loaded from the prompt file
    pub instructions: String,
    pub models: ModelConfig,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Load `.env.local` and `.env` (either may be missing), then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::from_filename(".env.local") {
            info!(error=%e, "no .env.local loaded");
        }
        if let Err(e) = dotenvy::dotenv() {
            info!(error=%e, "no .env loaded");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).and_then(non_empty);

        let appointment_webhook_url =
            var("APPOINTMENT_WEBHOOK_URL").ok_or(ConfigError::Missing("APPOINTMENT_WEBHOOK_URL"))?;

        let transfer_destination = var("TRANSFER_PHONE_NUMBER").and_then(|n| normalize_destination(&n));
        if transfer_destination.is_none() {
            warn!("TRANSFER_PHONE_NUMBER not set; transfers to staff will fail");
        }

        let call_control_url = var("CALL_CONTROL_URL").map(|u| u.trim_end_matches('/').to_string());
        if call_control_url.is_none() {
            warn!("CALL_CONTROL_URL not set; transfers to staff will fail");
        }
        let call_control_token = var("CALL_CONTROL_API_TOKEN");

        let fallback_phone =
            var("CLINIC_DISPLAY_PHONE").unwrap_or_else(|| DEFAULT_FALLBACK_PHONE.to_string());

        let idle_timeout = match var("IDLE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "IDLE_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        };

        let bind_addr = {
            let raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
            raw.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: raw,
            })?
        };

        let prompt_file = var("PROMPT_FILE").unwrap_or_else(|| DEFAULT_PROMPT_FILE.to_string());
        let instructions =
            fs::read_to_string(&prompt_file).map_err(|source| ConfigError::PromptFile {
                path: prompt_file.clone(),
                source,
            })?;

        let models = ModelConfig {
            stt: var("STT_MODEL").unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            llm: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            tts: var("TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
        };

        Ok(Self {
            appointment_webhook_url,
            transfer_destination,
            fallback_phone,
            call_control_url,
            call_control_token,
            idle_timeout,
            instructions,
            models,
            bind_addr,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Turn a configured transfer target into a dialable URI.  Bare numbers get a `tel:` scheme;
/// `tel:` and `sip:` URIs pass through untouched.
pub fn normalize_destination(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("tel:") || raw.starts_with("sip:") {
        Some(raw.to_string())
    } else {
        Some(format!("tel:{raw}"))
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests(appointment_webhook_url: &str) -> Self {
        Self {
            appointment_webhook_url: appointment_webhook_url.to_string(),
            transfer_destination: Some("tel:+13054858427".to_string()),
            fallback_phone: DEFAULT_FALLBACK_PHONE.to_string(),
            call_control_url: None,
            call_control_token: None,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            instructions: "You are a dental clinic receptionist.".to_string(),
            models: ModelConfig {
                stt: DEFAULT_STT_MODEL.to_string(),
                llm: DEFAULT_LLM_MODEL.to_string(),
                tts: DEFAULT_TTS_MODEL.to_string(),
            },
            bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
        }
    }
}
