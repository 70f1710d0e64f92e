//! Endpoints operators (tenants) call.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use std::time::Duration;

use crate::domain::errors::ControlPlaneError;
use crate::domain::models::{Bot, BotStatus, SpeakerTimeframe};
use crate::domain::ports::{BotFilter, NewBot};

use super::auth::authenticate_operator;
use super::state::AppState;
use super::types::{
    ApiError, ApiResult, ChatMessageRequest, CreateBotRequest, DeleteBotsRequest, DeployRequest,
    DeployResponse, ListBotsQuery, LogLevelRequest, ScreenshotListItem,
};

/// `POST /bots` — validate quota, persist, deploy immediately when the
/// start time is near.
pub async fn create_bot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateBotRequest>,
) -> ApiResult<Json<DeployResponse>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;

    if request.display_name.trim().is_empty() {
        return Err(ApiError(ControlPlaneError::ValidationFailed(
            "display name must not be empty".to_string(),
        )));
    }

    let defaults = &services.config.agent;
    let new_bot = NewBot {
        tenant_id: tenant.id,
        meeting_info: request.meeting_info,
        meeting_title: request.meeting_title.unwrap_or_default(),
        display_name: request.display_name,
        scheduled_start: request.start_time,
        scheduled_end: request.end_time,
        recording_enabled: request.recording_enabled,
        chat_enabled: request.chat_enabled,
        heartbeat_interval_ms: request
            .heartbeat_interval_ms
            .unwrap_or(defaults.heartbeat_interval_ms),
        automatic_leave: request.automatic_leave.unwrap_or_default(),
        callback_url: request.callback_url,
    };

    let (bot, outcome) = services
        .bot_service
        .create_bot(&tenant, new_bot, request.queue_timeout_ms)
        .await?;

    Ok(Json(match outcome {
        Some(outcome) => outcome.into(),
        None => DeployResponse {
            bot,
            queued: false,
            queue_position: None,
            estimated_wait_ms: None,
        },
    }))
}

/// `POST /bots/:id/deploy` — idempotent deploy trigger.
pub async fn deploy_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
    request: Option<Json<DeployRequest>>,
) -> ApiResult<Json<DeployResponse>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;

    let queue_timeout_ms = request.and_then(|Json(r)| r.queue_timeout_ms);
    let outcome = services
        .bot_service
        .deploy_bot(&tenant, bot_id, queue_timeout_ms)
        .await?;
    Ok(Json(outcome.into()))
}

/// `POST /bots/:id/cancel`
pub async fn cancel_deployment(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<Bot>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;
    let bot = services.bot_service.cancel_deployment(&tenant, bot_id).await?;
    Ok(Json(bot))
}

/// `POST /bots/:id/leave` — graceful remove-from-call.
pub async fn remove_from_call(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;
    services.bot_service.remove_from_call(&tenant, bot_id).await?;
    Ok(Json(json!({ "requested": true })))
}

/// `POST /bots/:id/log-level`
pub async fn set_log_level(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<LogLevelRequest>,
) -> ApiResult<Json<Value>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;
    services
        .bot_service
        .set_log_level(&tenant, bot_id, &request.level)
        .await?;
    Ok(Json(json!({ "requested": true })))
}

/// `POST /bots/:id/chat` — queue an outbound chat message.
pub async fn submit_chat_message(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ChatMessageRequest>,
) -> ApiResult<Json<Value>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;
    services
        .bot_service
        .submit_chat_message(&tenant, bot_id, &request.message_text)
        .await?;
    Ok(Json(json!({ "queued": true })))
}

/// `GET /bots`
pub async fn list_bots(
    State(state): State<AppState>,
    Query(query): Query<ListBotsQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Bot>>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(BotStatus::from_str(raw).ok_or_else(|| {
            ApiError(ControlPlaneError::ValidationFailed(format!(
                "unknown status {raw:?}"
            )))
        })?),
        None => None,
    };

    let bots = services
        .bot_service
        .list_bots(
            &tenant,
            BotFilter {
                tenant_id: None,
                status,
                limit: query.limit,
            },
        )
        .await?;
    Ok(Json(bots))
}

/// `GET /bots/:id`
pub async fn get_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<Bot>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;
    let bot = services.bot_service.get_bot(&tenant, bot_id).await?;
    Ok(Json(bot))
}

/// `DELETE /bots`
pub async fn delete_bots(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DeleteBotsRequest>,
) -> ApiResult<Json<Value>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;
    let deleted = services.bot_service.delete_bots(&tenant, &request.ids).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// `GET /bots/:id/speaker-timeframes`
pub async fn get_speaker_timeframes(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<SpeakerTimeframe>>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;
    let timeframes = services
        .bot_service
        .get_speaker_timeframes(&tenant, bot_id)
        .await?;
    Ok(Json(timeframes))
}

/// `GET /bots/:id/events`
pub async fn list_events(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<crate::domain::models::BotEvent>>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;
    services.bot_service.get_bot(&tenant, bot_id).await?;
    let events = services.event_log.events_for_bot(bot_id).await?;
    Ok(Json(events))
}

/// `GET /bots/:id/screenshots` — metadata plus short-lived signed URLs.
pub async fn list_screenshots(
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ScreenshotListItem>>> {
    let services = &state.services;
    let tenant = authenticate_operator(services, &headers).await?;

    let records = services
        .bot_service
        .list_screenshots(&tenant, bot_id)
        .await?;
    let ttl = Duration::from_secs(services.config.artifacts.signed_url_ttl_secs);

    let mut items = Vec::with_capacity(records.len());
    for record in records {
        let signed_url = services
            .bot_service
            .signed_screenshot_url(&record.object_key, ttl)
            .await
            .ok();
        items.push(ScreenshotListItem {
            key: record.object_key,
            captured_at: record.captured_at,
            shot_type: record.shot_type.as_str().to_string(),
            state: record.bot_state,
            signed_url,
        });
    }
    Ok(Json(items))
}
