//! Deployment queue persistence port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ControlPlaneResult;
use crate::domain::models::QueueEntry;

#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn enqueue(
        &self,
        bot_id: i64,
        priority: i32,
        queued_at: DateTime<Utc>,
        timeout_at: DateTime<Utc>,
    ) -> ControlPlaneResult<QueueEntry>;

    /// Head of the queue under (priority ASC, queued_at ASC, id ASC).
    async fn peek(&self) -> ControlPlaneResult<Option<QueueEntry>>;

    /// 1-indexed position of a bot's entry, `None` if not queued.
    async fn position(&self, bot_id: i64) -> ControlPlaneResult<Option<u64>>;

    async fn remove(&self, bot_id: i64) -> ControlPlaneResult<bool>;

    /// Pop every entry whose deadline has passed.
    async fn take_expired(&self, now: DateTime<Utc>) -> ControlPlaneResult<Vec<QueueEntry>>;

    async fn len(&self) -> ControlPlaneResult<u64>;
}
