//! Agent-inbound bot config payload.
//!
//! The full per-bot configuration travels to the container as a single
//! base64-encoded JSON blob in the `BOT_DATA` environment variable;
//! base64 sidesteps shell-quoting hazards across orchestrators.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bot::{AutomaticLeave, Bot, MeetingInfo};

/// Env var carrying the base64-encoded JSON payload.
pub const BOT_DATA_ENV: &str = "BOT_DATA";
/// Env var carrying the per-deployment agent auth token.
pub const BOT_AUTH_TOKEN_ENV: &str = "BOT_AUTH_TOKEN";
/// Env var carrying the control-plane base URL.
pub const CONTROL_PLANE_URL_ENV: &str = "CONTROL_PLANE_URL";
/// Env var carrying the artifact bucket name.
pub const ARTIFACT_BUCKET_ENV: &str = "ARTIFACT_BUCKET";
/// Env marker set when a slot is configured for production tenancy.
pub const RUN_ENV: &str = "MEETBOT_ENV";

#[derive(Debug, Error)]
pub enum BotConfigError {
    #[error("BOT_DATA is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("BOT_DATA payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

/// Everything the agent needs to attend one meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    pub id: i64,
    pub tenant_id: i64,
    pub meeting_info: MeetingInfo,
    pub meeting_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub recording_enabled: bool,
    pub heartbeat_interval_ms: u64,
    pub automatic_leave: AutomaticLeave,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub chat_enabled: bool,
}

impl BotConfig {
    pub fn from_bot(bot: &Bot) -> Self {
        Self {
            id: bot.id,
            tenant_id: bot.tenant_id,
            meeting_info: bot.meeting_info.clone(),
            meeting_title: bot.meeting_title.clone(),
            start_time: bot.scheduled_start,
            end_time: bot.scheduled_end,
            display_name: bot.display_name.clone(),
            image: None,
            recording_enabled: bot.recording_enabled,
            heartbeat_interval_ms: bot.heartbeat_interval_ms,
            automatic_leave: bot.automatic_leave,
            callback_url: bot.callback_url.clone(),
            chat_enabled: bot.chat_enabled,
        }
    }

    /// Serialize for the `BOT_DATA` env var.
    pub fn encode(&self) -> Result<String, BotConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(BASE64.encode(json))
    }

    /// Parse a `BOT_DATA` env var value.
    pub fn decode(encoded: &str) -> Result<Self, BotConfigError> {
        let bytes = BASE64.decode(encoded.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read the payload from the process environment.
    pub fn from_env() -> Result<Self, BotConfigError> {
        let raw = std::env::var(BOT_DATA_ENV)
            .map_err(|_| BotConfigError::MissingEnv(BOT_DATA_ENV))?;
        Self::decode(&raw)
    }
}
