//! Endpoints the in-container agent calls.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::errors::ControlPlaneError;
use crate::domain::models::{BotStatus, EventType, ScreenshotType};

use super::auth::authenticate_agent;
use super::state::AppState;
use super::types::{
    ApiError, ApiResult, AttachScreenshotRequest, HeartbeatResponse, ReportEventRequest,
    ScreenshotQuery, ScreenshotResponse, UpdateStatusRequest,
};

/// `POST /agent/bots/:id/heartbeat` — liveness ping; the response
/// carries operator intent (leave, log level).
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<HeartbeatResponse>> {
    let services = &state.services;
    authenticate_agent(services, &headers)?;

    services.bots.touch_heartbeat(bot_id, Utc::now()).await?;
    let (should_leave, log_level) = services.bots.take_heartbeat_intent(bot_id).await?;
    debug!(bot_id, should_leave, ?log_level, "heartbeat");

    Ok(Json(HeartbeatResponse {
        should_leave: should_leave.then_some(true),
        log_level,
    }))
}

/// `POST /agent/bots/:id/events` — append to the event log; status-class
/// events also move the status projection. Terminal transitions recycle
/// the slot and drain the queue.
pub async fn report_event(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ReportEventRequest>,
) -> ApiResult<Json<Value>> {
    let services = &state.services;
    authenticate_agent(services, &headers)?;

    let event_type = EventType::from_str(&request.event_type).ok_or_else(|| {
        ApiError(ControlPlaneError::ValidationFailed(format!(
            "unknown event type {:?}",
            request.event_type
        )))
    })?;

    let event = services
        .event_log
        .record(bot_id, event_type, request.event_time, request.data)
        .await?;

    if matches!(event_type.status(), Some(s) if s.is_terminal()) {
        services.bot_service.handle_termination(bot_id).await?;
    }

    Ok(Json(json!({ "eventId": event.id })))
}

/// `POST /agent/bots/:id/status` — direct status update with final
/// artifacts. Recording key is required for DONE on recording-enabled
/// bots.
pub async fn update_status(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Value>> {
    let services = &state.services;
    authenticate_agent(services, &headers)?;

    let status = BotStatus::from_str(&request.status).ok_or_else(|| {
        ApiError(ControlPlaneError::ValidationFailed(format!(
            "unknown status {:?}",
            request.status
        )))
    })?;

    let updated = services
        .event_log
        .update_status(bot_id, status, request.recording_key, request.speaker_timeframes)
        .await?;

    if updated.is_some() && status.is_terminal() {
        services.bot_service.handle_termination(bot_id).await?;
    }

    Ok(Json(json!({ "applied": updated.is_some() })))
}

/// `POST /agent/bots/:id/chat/dequeue` — pop the next outbound chat
/// message, at-most-once. 204-equivalent null body when empty.
pub async fn dequeue_message(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let services = &state.services;
    authenticate_agent(services, &headers)?;

    match services.chat.dequeue(bot_id).await? {
        Some(message) => Ok(Json(json!({ "messageText": message.message_text }))),
        None => Ok(Json(Value::Null)),
    }
}

/// `POST /agent/bots/:id/screenshots` — raw PNG body; the control plane
/// owns storage and returns the object key.
pub async fn upload_screenshot(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    Query(query): Query<ScreenshotQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ScreenshotResponse>> {
    let services = &state.services;
    authenticate_agent(services, &headers)?;

    let shot_type = ScreenshotType::from_str(&query.shot_type).ok_or_else(|| {
        ApiError(ControlPlaneError::ValidationFailed(format!(
            "unknown screenshot type {:?}",
            query.shot_type
        )))
    })?;

    let record = services
        .bot_service
        .store_screenshot(
            bot_id,
            body.to_vec(),
            shot_type,
            &query.state,
            query.trigger.as_deref(),
        )
        .await?;

    Ok(Json(ScreenshotResponse {
        key: record.object_key,
        captured_at: record.captured_at,
        shot_type: record.shot_type.as_str().to_string(),
        state: record.bot_state,
        trigger: record.trigger_event,
    }))
}

/// `POST /agent/bots/:id/screenshots/metadata` — attach metadata for a
/// screenshot already sitting in the artifact store.
pub async fn add_screenshot(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<AttachScreenshotRequest>,
) -> ApiResult<Json<Value>> {
    let services = &state.services;
    authenticate_agent(services, &headers)?;

    let shot_type = ScreenshotType::from_str(&request.shot_type).ok_or_else(|| {
        ApiError(ControlPlaneError::ValidationFailed(format!(
            "unknown screenshot type {:?}",
            request.shot_type
        )))
    })?;

    let record = services
        .bot_service
        .attach_screenshot(
            bot_id,
            &request.key,
            shot_type,
            &request.state,
            request.trigger.as_deref(),
            request.captured_at,
        )
        .await?;

    Ok(Json(json!({ "screenshotId": record.id })))
}
