//! Bot domain model.
//!
//! A bot is one scheduled or running meeting attendance, with its own
//! container and lifecycle. Status is a projection of status-class
//! events reported by the agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotStatus {
    /// Persisted but not yet handed to the deployment coordinator
    Created,
    /// Waiting for a pool slot to free up
    Queued,
    /// Slot assigned, container configuring/starting
    Deploying,
    /// Agent is up and navigating into the meeting
    JoiningCall,
    /// Admission pending in the platform waiting room
    InWaitingRoom,
    /// Attending the meeting
    InCall,
    /// Meeting over, agent finalizing artifacts
    CallEnded,
    /// Clean exit
    Done,
    /// Unrecoverable failure at any stage
    Fatal,
    /// Operator cancelled before the bot reached the call
    Cancelled,
}

impl Default for BotStatus {
    fn default() -> Self {
        Self::Created
    }
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Queued => "QUEUED",
            Self::Deploying => "DEPLOYING",
            Self::JoiningCall => "JOINING_CALL",
            Self::InWaitingRoom => "IN_WAITING_ROOM",
            Self::InCall => "IN_CALL",
            Self::CallEnded => "CALL_ENDED",
            Self::Done => "DONE",
            Self::Fatal => "FATAL",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CREATED" => Some(Self::Created),
            "QUEUED" => Some(Self::Queued),
            "DEPLOYING" => Some(Self::Deploying),
            "JOINING_CALL" => Some(Self::JoiningCall),
            "IN_WAITING_ROOM" => Some(Self::InWaitingRoom),
            "IN_CALL" => Some(Self::InCall),
            "CALL_ENDED" => Some(Self::CallEnded),
            "DONE" => Some(Self::Done),
            "FATAL" => Some(Self::Fatal),
            "CANCELLED" | "CANCELED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Fatal | Self::Cancelled)
    }

    /// States from which an operator cancel is accepted.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Created | Self::Queued | Self::Deploying)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [BotStatus] {
        match self {
            Self::Created => &[Self::Queued, Self::Deploying, Self::Fatal, Self::Cancelled],
            Self::Queued => &[Self::Deploying, Self::JoiningCall, Self::Fatal, Self::Cancelled],
            Self::Deploying => &[Self::JoiningCall, Self::Fatal, Self::Cancelled],
            Self::JoiningCall => &[Self::InWaitingRoom, Self::InCall, Self::Fatal],
            Self::InWaitingRoom => &[Self::InCall, Self::Fatal],
            Self::InCall => &[Self::CallEnded, Self::Fatal],
            Self::CallEnded => &[Self::Done, Self::Fatal],
            Self::Done => &[],
            Self::Fatal => &[],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported meeting platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingPlatform {
    Meet,
    Teams,
    Zoom,
}

impl MeetingPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meet => "meet",
            Self::Teams => "teams",
            Self::Zoom => "zoom",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "meet" | "google_meet" => Some(Self::Meet),
            "teams" => Some(Self::Teams),
            "zoom" => Some(Self::Zoom),
            _ => None,
        }
    }
}

impl std::fmt::Display for MeetingPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for meetings that require sign-in before joining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingCredentials {
    pub username: String,
    pub password: String,
}

/// Where and what the bot is attending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingInfo {
    pub platform: MeetingPlatform,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<MeetingCredentials>,
}

/// Timeouts after which the agent leaves on its own. Each is clamped
/// to at least 60 seconds at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticLeave {
    pub waiting_room_timeout_ms: u64,
    pub no_one_joined_timeout_ms: u64,
    pub everyone_left_timeout_ms: u64,
    pub inactivity_timeout_ms: u64,
}

/// Floor for every automatic-leave timeout.
pub const MIN_LEAVE_TIMEOUT_MS: u64 = 60_000;

impl Default for AutomaticLeave {
    fn default() -> Self {
        Self {
            waiting_room_timeout_ms: 300_000,
            no_one_joined_timeout_ms: 300_000,
            everyone_left_timeout_ms: 120_000,
            inactivity_timeout_ms: 600_000,
        }
    }
}

impl AutomaticLeave {
    /// Raise any sub-minute timeout to the 60 s floor.
    pub fn clamped(self) -> Self {
        Self {
            waiting_room_timeout_ms: self.waiting_room_timeout_ms.max(MIN_LEAVE_TIMEOUT_MS),
            no_one_joined_timeout_ms: self.no_one_joined_timeout_ms.max(MIN_LEAVE_TIMEOUT_MS),
            everyone_left_timeout_ms: self.everyone_left_timeout_ms.max(MIN_LEAVE_TIMEOUT_MS),
            inactivity_timeout_ms: self.inactivity_timeout_ms.max(MIN_LEAVE_TIMEOUT_MS),
        }
    }
}

/// One speaker's active interval within the recording, in milliseconds
/// from recording start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerTimeframe {
    pub speaker: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// One scheduled or running attendance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub id: i64,
    pub tenant_id: i64,
    pub meeting_info: MeetingInfo,
    pub meeting_title: String,
    pub display_name: String,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub recording_enabled: bool,
    pub chat_enabled: bool,
    pub heartbeat_interval_ms: u64,
    pub automatic_leave: AutomaticLeave,
    pub callback_url: Option<String>,
    pub status: BotStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub deployment_platform: Option<String>,
    pub platform_identifier: Option<String>,
    pub recording_key: Option<String>,
    pub speaker_timeframes: Option<Vec<SpeakerTimeframe>>,
    pub deployment_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bot {
    /// Whether the scheduled start is close enough (or absent) that the
    /// bot should be handed to the deployment coordinator right away.
    pub fn should_deploy_immediately(&self, now: DateTime<Utc>) -> bool {
        match self.scheduled_start {
            None => true,
            Some(start) => start - now <= chrono::Duration::minutes(5),
        }
    }
}
