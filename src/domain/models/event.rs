//! Bot lifecycle events.
//!
//! The event log is append-only. Status-class events additionally move
//! the bot's status projection; non-status events are logged only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bot::BotStatus;

/// Everything an agent can report about a bot's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Status-class: emission updates the status projection.
    Deploying,
    JoiningCall,
    InWaitingRoom,
    InCall,
    CallEnded,
    Done,
    Fatal,

    // Log-only.
    ParticipantJoin,
    ParticipantLeave,
    Log,
    SignInRequired,
    CaptchaDetected,
    MeetingNotFound,
    MeetingEnded,
    PermissionDenied,
    JoinBlocked,
    Restarting,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploying => "DEPLOYING",
            Self::JoiningCall => "JOINING_CALL",
            Self::InWaitingRoom => "IN_WAITING_ROOM",
            Self::InCall => "IN_CALL",
            Self::CallEnded => "CALL_ENDED",
            Self::Done => "DONE",
            Self::Fatal => "FATAL",
            Self::ParticipantJoin => "PARTICIPANT_JOIN",
            Self::ParticipantLeave => "PARTICIPANT_LEAVE",
            Self::Log => "LOG",
            Self::SignInRequired => "SIGN_IN_REQUIRED",
            Self::CaptchaDetected => "CAPTCHA_DETECTED",
            Self::MeetingNotFound => "MEETING_NOT_FOUND",
            Self::MeetingEnded => "MEETING_ENDED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::JoinBlocked => "JOIN_BLOCKED",
            Self::Restarting => "RESTARTING",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DEPLOYING" => Some(Self::Deploying),
            "JOINING_CALL" => Some(Self::JoiningCall),
            "IN_WAITING_ROOM" => Some(Self::InWaitingRoom),
            "IN_CALL" => Some(Self::InCall),
            "CALL_ENDED" => Some(Self::CallEnded),
            "DONE" => Some(Self::Done),
            "FATAL" => Some(Self::Fatal),
            "PARTICIPANT_JOIN" => Some(Self::ParticipantJoin),
            "PARTICIPANT_LEAVE" => Some(Self::ParticipantLeave),
            "LOG" => Some(Self::Log),
            "SIGN_IN_REQUIRED" => Some(Self::SignInRequired),
            "CAPTCHA_DETECTED" => Some(Self::CaptchaDetected),
            "MEETING_NOT_FOUND" => Some(Self::MeetingNotFound),
            "MEETING_ENDED" => Some(Self::MeetingEnded),
            "PERMISSION_DENIED" => Some(Self::PermissionDenied),
            "JOIN_BLOCKED" => Some(Self::JoinBlocked),
            "RESTARTING" => Some(Self::Restarting),
            _ => None,
        }
    }

    /// Status this event projects onto, if it is status-class.
    pub fn status(&self) -> Option<BotStatus> {
        match self {
            Self::Deploying => Some(BotStatus::Deploying),
            Self::JoiningCall => Some(BotStatus::JoiningCall),
            Self::InWaitingRoom => Some(BotStatus::InWaitingRoom),
            Self::InCall => Some(BotStatus::InCall),
            Self::CallEnded => Some(BotStatus::CallEnded),
            Self::Done => Some(BotStatus::Done),
            Self::Fatal => Some(BotStatus::Fatal),
            _ => None,
        }
    }

    pub fn is_status_class(&self) -> bool {
        self.status().is_some()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form payload attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_code: Option<String>,
}

impl EventData {
    pub fn description(text: impl Into<String>) -> Self {
        Self {
            description: Some(text.into()),
            sub_code: None,
        }
    }

    pub fn sub_code(code: impl Into<String>) -> Self {
        Self {
            description: None,
            sub_code: Some(code.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.sub_code.is_none()
    }
}

/// One appended record in a bot's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotEvent {
    pub id: i64,
    pub bot_id: i64,
    pub event_type: EventType,
    pub event_time: DateTime<Utc>,
    #[serde(default)]
    pub data: EventData,
}

/// Sub-code attached to FATAL when the agent hits its duration ceiling.
pub const SUB_CODE_DURATION_LIMIT: &str = "DURATION_LIMIT_EXCEEDED";
/// Sub-code attached to FATAL when a queue entry expires unserved.
pub const SUB_CODE_QUEUE_TIMEOUT: &str = "QUEUE_TIMEOUT";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_class_partition() {
        let status_class = [
            EventType::Deploying,
            EventType::JoiningCall,
            EventType::InWaitingRoom,
            EventType::InCall,
            EventType::CallEnded,
            EventType::Done,
            EventType::Fatal,
        ];
        for event in status_class {
            assert!(event.is_status_class(), "{event} should be status-class");
        }

        let log_only = [
            EventType::ParticipantJoin,
            EventType::ParticipantLeave,
            EventType::Log,
            EventType::SignInRequired,
            EventType::CaptchaDetected,
            EventType::MeetingNotFound,
            EventType::MeetingEnded,
            EventType::PermissionDenied,
            EventType::JoinBlocked,
            EventType::Restarting,
        ];
        for event in log_only {
            assert!(!event.is_status_class(), "{event} should be log-only");
        }
    }

    #[test]
    fn event_type_round_trips() {
        for s in ["DEPLOYING", "IN_CALL", "PARTICIPANT_JOIN", "RESTARTING"] {
            let parsed = EventType::from_str(s).expect("known token");
            assert_eq!(parsed.as_str(), s);
        }
        assert_eq!(EventType::from_str("NOT_A_THING"), None);
    }

    #[test]
    fn event_data_serializes_sparsely() {
        let data = EventData::sub_code(SUB_CODE_QUEUE_TIMEOUT);
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"sub_code":"QUEUE_TIMEOUT"}"#);
    }
}
