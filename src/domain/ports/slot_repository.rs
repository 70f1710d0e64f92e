//! Warm-pool slot persistence port.
//!
//! Slot rows are exclusively owned by the pool manager and the slot
//! recovery worker; all mutation goes through these primitives, and
//! the acquire path is a single conditional update so concurrent
//! acquirers can never obtain the same slot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ControlPlaneResult;
use crate::domain::models::{MeetingPlatform, PoolSlot, SlotStatus};

#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Atomically claim one idle slot for `bot_id` (oldest
    /// `last_used_at` first). Returns `None` when no idle slot exists.
    /// N concurrent calls obtain N distinct slots or nulls.
    async fn acquire_idle(
        &self,
        platform: MeetingPlatform,
        bot_id: i64,
        now: DateTime<Utc>,
    ) -> ControlPlaneResult<Option<PoolSlot>>;

    /// Insert a freshly created slot row in `deploying`, already
    /// assigned to `bot_id`.
    async fn insert(
        &self,
        slot_name: &str,
        service_id: &str,
        platform: MeetingPlatform,
        bot_id: i64,
        now: DateTime<Utc>,
    ) -> ControlPlaneResult<PoolSlot>;

    async fn get(&self, id: i64) -> ControlPlaneResult<Option<PoolSlot>>;

    async fn find_by_bot(&self, bot_id: i64) -> ControlPlaneResult<Option<PoolSlot>>;

    async fn list(&self) -> ControlPlaneResult<Vec<PoolSlot>>;

    async fn count(&self, platform: MeetingPlatform) -> ControlPlaneResult<i64>;

    /// Mark a slot busy for a bot (used when a new slot finishes its
    /// first deployment).
    async fn mark_busy(&self, id: i64, bot_id: i64, now: DateTime<Utc>)
        -> ControlPlaneResult<()>;

    /// Return a slot to the idle pool, clearing assignment, error and
    /// recovery counters.
    async fn release(&self, id: i64, now: DateTime<Utc>) -> ControlPlaneResult<()>;

    async fn mark_error(&self, id: i64, message: &str) -> ControlPlaneResult<()>;

    /// Slots the recovery worker should look at: status `error`, or
    /// `deploying` with `last_used_at` older than `stale_before`.
    async fn find_recoverable(
        &self,
        stale_before: DateTime<Utc>,
    ) -> ControlPlaneResult<Vec<PoolSlot>>;

    async fn increment_recovery_attempts(&self, id: i64) -> ControlPlaneResult<()>;

    async fn delete(&self, id: i64) -> ControlPlaneResult<()>;

    async fn set_status(&self, id: i64, status: SlotStatus) -> ControlPlaneResult<()>;
}
