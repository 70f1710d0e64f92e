//! Outbound chat message queue port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ControlPlaneResult;

/// A chat message queued for delivery into the meeting.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: i64,
    pub bot_id: i64,
    pub message_text: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn enqueue(&self, bot_id: i64, message_text: &str) -> ControlPlaneResult<ChatMessage>;

    /// Pop the oldest undelivered message for a bot. At-most-once: the
    /// row is marked dequeued in the same statement that selects it.
    async fn dequeue(&self, bot_id: i64) -> ControlPlaneResult<Option<ChatMessage>>;

    async fn pending_count(&self, bot_id: i64) -> ControlPlaneResult<i64>;
}
