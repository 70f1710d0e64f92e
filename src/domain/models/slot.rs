//! Warm-pool slot model.
//!
//! A slot is a long-lived container reservation assigned to bots in
//! succession. Slot rows are the canonical ownership record; the
//! orchestrator's service id is referenced, never authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bot::MeetingPlatform;

/// Hard cap on slots per deployment target.
pub const MAX_POOL_SIZE: usize = 100;
/// A slot in `error` or stale `deploying` is deleted once it has burned
/// this many recovery attempts.
pub const MAX_RECOVERY_ATTEMPTS: i32 = 3;

/// Disposition of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    /// Free for assignment
    Idle,
    /// Backing container created/starting, not yet serving
    Deploying,
    /// Assigned to a bot
    Busy,
    /// Container reported healthy outside an assignment
    Healthy,
    /// Stop or start failed; recovery worker owns it now
    Error,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Deploying => "deploying",
            Self::Busy => "busy",
            Self::Healthy => "healthy",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "deploying" => Some(Self::Deploying),
            "busy" => Some(Self::Busy),
            "healthy" => Some(Self::Healthy),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One long-lived container reservation in the warm pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSlot {
    pub id: i64,
    pub slot_name: String,
    pub service_id: String,
    pub platform: MeetingPlatform,
    pub status: SlotStatus,
    pub assigned_bot_id: Option<i64>,
    pub last_used_at: DateTime<Utc>,
    pub recovery_attempts: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PoolSlot {
    /// Stable human-readable name for the Nth slot of a platform,
    /// e.g. `pool-zoom-007`.
    pub fn derive_name(platform: MeetingPlatform, ordinal: usize) -> String {
        format!("pool-{}-{:03}", platform, ordinal)
    }
}
