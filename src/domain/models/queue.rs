//! Queue entry model: a bot waiting for a pool slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default priority assigned to enqueued bots. Smaller drains sooner.
pub const DEFAULT_PRIORITY: i32 = 100;
/// Default time a bot may wait before it is failed out of the queue.
pub const DEFAULT_QUEUE_TIMEOUT_MS: u64 = 300_000;
/// Upper bound on the caller-supplied queue timeout.
pub const MAX_QUEUE_TIMEOUT_MS: u64 = 600_000;
/// Coarse per-position wait estimate.
pub const ESTIMATED_WAIT_PER_POSITION_MS: u64 = 30_000;

/// A bot parked until a slot frees. Ordering key is
/// (priority ASC, queued_at ASC, id ASC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub bot_id: i64,
    pub priority: i32,
    pub queued_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
}

/// Clamp a caller-supplied queue timeout to the allowed ceiling.
pub fn clamp_queue_timeout_ms(requested: u64) -> u64 {
    requested.min(MAX_QUEUE_TIMEOUT_MS)
}

/// Informational wait estimate for a 1-indexed queue position.
pub fn estimated_wait_ms(position: u64) -> u64 {
    position * ESTIMATED_WAIT_PER_POSITION_MS
}
