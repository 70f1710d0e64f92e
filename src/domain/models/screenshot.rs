//! Screenshot metadata attached to bots for diagnosis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a screenshot was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotType {
    /// Routine capture on a status transition
    Status,
    /// Captured when the agent hit an error condition
    Error,
    /// Captured alongside a FATAL event
    Fatal,
}

impl ScreenshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "status" => Some(Self::Status),
            "error" => Some(Self::Error),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }
}

/// Stored screenshot metadata; bytes live in the artifact store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRecord {
    pub id: i64,
    pub bot_id: i64,
    pub object_key: String,
    pub shot_type: ScreenshotType,
    /// Bot status string at capture time.
    pub bot_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_event: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Object key for a screenshot:
/// `bots/<bot-id>/screenshots/<uuid>-<type>-<timestampMs>.png`.
pub fn screenshot_key(bot_id: i64, shot_type: ScreenshotType, captured_at: DateTime<Utc>) -> String {
    format!(
        "bots/{}/screenshots/{}-{}-{}.png",
        bot_id,
        Uuid::new_v4(),
        shot_type.as_str(),
        captured_at.timestamp_millis()
    )
}

/// Object key for a finished recording:
/// `recordings/<uuid>-<platform>-recording.<ext>`.
pub fn recording_key(platform: super::bot::MeetingPlatform, ext: &str) -> String {
    format!("recordings/{}-{}-recording.{}", Uuid::new_v4(), platform, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::bot::MeetingPlatform;

    #[test]
    fn screenshot_key_layout() {
        let at = Utc::now();
        let key = screenshot_key(9, ScreenshotType::Fatal, at);
        assert!(key.starts_with("bots/9/screenshots/"));
        assert!(key.contains("-fatal-"));
        assert!(key.ends_with(&format!("{}.png", at.timestamp_millis())));
    }

    #[test]
    fn recording_key_layout() {
        let key = recording_key(MeetingPlatform::Zoom, "mp4");
        assert!(key.starts_with("recordings/"));
        assert!(key.ends_with("-zoom-recording.mp4"));
    }
}
