//! SQLite implementation of the outbound chat queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::ports::{ChatMessage, ChatRepository};

#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: SqlitePool,
}

impl SqliteChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: i64,
    bot_id: i64,
    message_text: String,
    created_at: String,
}

impl TryFrom<ChatRow> for ChatMessage {
    type Error = ControlPlaneError;

    fn try_from(row: ChatRow) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ControlPlaneError::Database(format!("bad timestamp: {e}")))?;
        Ok(ChatMessage {
            id: row.id,
            bot_id: row.bot_id,
            message_text: row.message_text,
            created_at,
        })
    }
}

#[async_trait]
impl ChatRepository for SqliteChatRepository {
    async fn enqueue(&self, bot_id: i64, message_text: &str) -> ControlPlaneResult<ChatMessage> {
        let row: ChatRow = sqlx::query_as(
            r#"INSERT INTO chat_messages (bot_id, message_text, created_at)
               VALUES (?, ?, ?)
               RETURNING id, bot_id, message_text, created_at"#,
        )
        .bind(bot_id)
        .bind(message_text)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn dequeue(&self, bot_id: i64) -> ControlPlaneResult<Option<ChatMessage>> {
        // Select and mark delivered in one statement: at-most-once.
        let row: Option<ChatRow> = sqlx::query_as(
            r#"UPDATE chat_messages SET dequeued_at = ?
               WHERE id = (
                   SELECT id FROM chat_messages
                   WHERE bot_id = ? AND dequeued_at IS NULL
                   ORDER BY id ASC
                   LIMIT 1
               )
               RETURNING id, bot_id, message_text, created_at"#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn pending_count(&self, bot_id: i64) -> ControlPlaneResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_messages WHERE bot_id = ? AND dequeued_at IS NULL",
        )
        .bind(bot_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{connection::create_test_pool, migrations};

    async fn setup() -> SqliteChatRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::migrate(&pool).await.unwrap();
        sqlx::query("INSERT INTO tenants (name, plan, timezone) VALUES ('t', 'free', 'UTC')")
            .execute(&pool)
            .await
            .unwrap();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO bots (tenant_id, platform, meeting_url, display_name,
               automatic_leave, created_at, updated_at)
               VALUES (1, 'meet', 'https://meet.example', 'bot', '{}', ?, ?)"#,
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        SqliteChatRepository::new(pool)
    }

    #[tokio::test]
    async fn dequeue_is_fifo_and_at_most_once() {
        let repo = setup().await;
        repo.enqueue(1, "first").await.unwrap();
        repo.enqueue(1, "second").await.unwrap();

        assert_eq!(repo.dequeue(1).await.unwrap().unwrap().message_text, "first");
        assert_eq!(repo.dequeue(1).await.unwrap().unwrap().message_text, "second");
        assert!(repo.dequeue(1).await.unwrap().is_none());
        assert_eq!(repo.pending_count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dequeue_for_other_bot_returns_nothing() {
        let repo = setup().await;
        repo.enqueue(1, "hello").await.unwrap();
        assert!(repo.dequeue(2).await.unwrap().is_none());
        assert_eq!(repo.pending_count(1).await.unwrap(), 1);
    }
}
