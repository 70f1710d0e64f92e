//! Bot persistence port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ControlPlaneResult;
use crate::domain::models::{Bot, BotStatus, SpeakerTimeframe};

/// Filters for listing bots.
#[derive(Debug, Clone, Default)]
pub struct BotFilter {
    pub tenant_id: Option<i64>,
    pub status: Option<BotStatus>,
    pub limit: Option<i64>,
}

/// Fields a new bot row is created from; id and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewBot {
    pub tenant_id: i64,
    pub meeting_info: crate::domain::models::MeetingInfo,
    pub meeting_title: String,
    pub display_name: String,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub recording_enabled: bool,
    pub chat_enabled: bool,
    pub heartbeat_interval_ms: u64,
    pub automatic_leave: crate::domain::models::AutomaticLeave,
    pub callback_url: Option<String>,
}

#[async_trait]
pub trait BotRepository: Send + Sync {
    async fn insert(&self, bot: NewBot) -> ControlPlaneResult<Bot>;

    async fn get(&self, id: i64) -> ControlPlaneResult<Option<Bot>>;

    async fn list(&self, filter: BotFilter) -> ControlPlaneResult<Vec<Bot>>;

    async fn delete(&self, ids: &[i64], tenant_id: i64) -> ControlPlaneResult<u64>;

    /// Conditionally advance status. Returns the updated bot, or `None`
    /// when the bot is already terminal or the transition is not legal
    /// from its current status — the guard is enforced in one statement
    /// so racing writers cannot resurrect a DONE/FATAL/CANCELLED bot.
    async fn transition_status(
        &self,
        id: i64,
        to: BotStatus,
    ) -> ControlPlaneResult<Option<Bot>>;

    /// Record the final artifacts alongside a DONE transition.
    async fn finalize(
        &self,
        id: i64,
        recording_key: Option<String>,
        speaker_timeframes: Option<Vec<SpeakerTimeframe>>,
    ) -> ControlPlaneResult<()>;

    async fn set_deployment(
        &self,
        id: i64,
        deployment_platform: &str,
        platform_identifier: &str,
    ) -> ControlPlaneResult<()>;

    async fn set_deployment_error(&self, id: i64, message: &str) -> ControlPlaneResult<()>;

    async fn touch_heartbeat(&self, id: i64, at: DateTime<Utc>) -> ControlPlaneResult<()>;

    /// Set or clear the operator's leave request; the next heartbeat
    /// response carries it to the agent.
    async fn set_leave_requested(&self, id: i64, requested: bool) -> ControlPlaneResult<()>;

    /// Set the log level the agent should switch to; delivered on the
    /// next heartbeat and cleared once read.
    async fn set_desired_log_level(&self, id: i64, level: Option<&str>) -> ControlPlaneResult<()>;

    /// Read-and-clear the operator intent carried by heartbeats:
    /// `(leave_requested, desired_log_level)`.
    async fn take_heartbeat_intent(&self, id: i64)
        -> ControlPlaneResult<(bool, Option<String>)>;
}
