//! Append-only bot event log port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ControlPlaneResult;
use crate::domain::models::{BotEvent, EventData, EventType};

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append one event. Inserts only; re-delivery is permitted, so the
    /// log may contain duplicates.
    async fn append(
        &self,
        bot_id: i64,
        event_type: EventType,
        event_time: DateTime<Utc>,
        data: EventData,
    ) -> ControlPlaneResult<BotEvent>;

    /// Events for one bot ordered by event time.
    async fn list_for_bot(&self, bot_id: i64) -> ControlPlaneResult<Vec<BotEvent>>;

    /// Most recent status-class event for a bot, if any.
    async fn latest_status_event(&self, bot_id: i64) -> ControlPlaneResult<Option<BotEvent>>;
}
