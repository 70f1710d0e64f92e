//! Request/response DTOs for the RPC surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::errors::ControlPlaneError;
use crate::domain::models::{
    AutomaticLeave, EventData, MeetingInfo, SpeakerTimeframe,
};

/// Wire-level error with the HTTP status it maps to.
#[derive(Debug)]
pub struct ApiError(pub ControlPlaneError);

impl From<ControlPlaneError> for ApiError {
    fn from(err: ControlPlaneError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ControlPlaneError::BotNotFound(_) | ControlPlaneError::TenantNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ControlPlaneError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ControlPlaneError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ControlPlaneError::PlatformUnsupported(_)
            | ControlPlaneError::ValidationFailed(_)
            | ControlPlaneError::InvalidStatusTransition { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBotRequest {
    pub meeting_info: MeetingInfo,
    #[serde(default)]
    pub meeting_title: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recording_enabled: bool,
    #[serde(default)]
    pub chat_enabled: bool,
    #[serde(default)]
    pub heartbeat_interval_ms: Option<u64>,
    #[serde(default)]
    pub automatic_leave: Option<AutomaticLeave>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub queue_timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub bot: crate::domain::models::Bot,
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_ms: Option<u64>,
}

impl From<crate::services::DeployOutcome> for DeployResponse {
    fn from(outcome: crate::services::DeployOutcome) -> Self {
        Self {
            bot: outcome.bot,
            queued: outcome.queued,
            queue_position: outcome.queue_position,
            estimated_wait_ms: outcome.estimated_wait_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(default)]
    pub queue_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBotsRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    pub message_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLevelRequest {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEventRequest {
    pub event_type: String,
    pub event_time: DateTime<Utc>,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub recording_key: Option<String>,
    #[serde(default)]
    pub speaker_timeframes: Option<Vec<SpeakerTimeframe>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_leave: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DequeueResponse {
    pub message_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotQuery {
    #[serde(rename = "type")]
    pub shot_type: String,
    pub state: String,
    #[serde(default)]
    pub trigger: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotResponse {
    pub key: String,
    pub captured_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub shot_type: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachScreenshotRequest {
    pub key: String,
    pub captured_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub shot_type: String,
    pub state: String,
    #[serde(default)]
    pub trigger: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotListItem {
    pub key: String,
    pub captured_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub shot_type: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListBotsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}
