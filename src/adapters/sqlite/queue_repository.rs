//! SQLite implementation of the QueueRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::QueueEntry;
use crate::domain::ports::QueueRepository;

#[derive(Clone)]
pub struct SqliteQueueRepository {
    pool: SqlitePool,
}

impl SqliteQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: i64,
    bot_id: i64,
    priority: i32,
    queued_at: String,
    timeout_at: String,
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = ControlPlaneError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        let parse = |raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ControlPlaneError::Database(format!("bad timestamp {raw:?}: {e}")))
        };
        Ok(QueueEntry {
            id: row.id,
            bot_id: row.bot_id,
            priority: row.priority,
            queued_at: parse(&row.queued_at)?,
            timeout_at: parse(&row.timeout_at)?,
        })
    }
}

#[async_trait]
impl QueueRepository for SqliteQueueRepository {
    async fn enqueue(
        &self,
        bot_id: i64,
        priority: i32,
        queued_at: DateTime<Utc>,
        timeout_at: DateTime<Utc>,
    ) -> ControlPlaneResult<QueueEntry> {
        let row: QueueRow = sqlx::query_as(
            r#"INSERT INTO queue_entries (bot_id, priority, queued_at, timeout_at)
               VALUES (?, ?, ?, ?)
               RETURNING id, bot_id, priority, queued_at, timeout_at"#,
        )
        .bind(bot_id)
        .bind(priority)
        .bind(queued_at.to_rfc3339())
        .bind(timeout_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn peek(&self) -> ControlPlaneResult<Option<QueueEntry>> {
        let row: Option<QueueRow> = sqlx::query_as(
            r#"SELECT id, bot_id, priority, queued_at, timeout_at FROM queue_entries
               ORDER BY priority ASC, queued_at ASC, id ASC
               LIMIT 1"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn position(&self, bot_id: i64) -> ControlPlaneResult<Option<u64>> {
        // Count entries that sort strictly ahead of the bot's entry.
        let row: Option<(i64,)> = sqlx::query_as(
            r#"SELECT 1 + (
                   SELECT COUNT(*) FROM queue_entries q2
                   WHERE (q2.priority, q2.queued_at, q2.id) < (q1.priority, q1.queued_at, q1.id)
               )
               FROM queue_entries q1 WHERE q1.bot_id = ?"#,
        )
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(p,)| p as u64))
    }

    async fn remove(&self, bot_id: i64) -> ControlPlaneResult<bool> {
        let result = sqlx::query("DELETE FROM queue_entries WHERE bot_id = ?")
            .bind(bot_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn take_expired(&self, now: DateTime<Utc>) -> ControlPlaneResult<Vec<QueueEntry>> {
        let rows: Vec<QueueRow> = sqlx::query_as(
            r#"DELETE FROM queue_entries WHERE timeout_at < ?
               RETURNING id, bot_id, priority, queued_at, timeout_at"#,
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn len(&self) -> ControlPlaneResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queue_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{connection::create_test_pool, migrations};

    async fn setup() -> (SqliteQueueRepository, SqlitePool) {
        let pool = create_test_pool().await.unwrap();
        migrations::migrate(&pool).await.unwrap();
        sqlx::query("INSERT INTO tenants (name, plan, timezone) VALUES ('t', 'free', 'UTC')")
            .execute(&pool)
            .await
            .unwrap();
        (SqliteQueueRepository::new(pool.clone()), pool)
    }

    async fn seed_bot(pool: &SqlitePool) -> i64 {
        let now = Utc::now().to_rfc3339();
        let row: (i64,) = sqlx::query_as(
            r#"INSERT INTO bots (tenant_id, platform, meeting_url, display_name,
               automatic_leave, created_at, updated_at)
               VALUES (1, 'meet', 'https://meet.example', 'bot', '{}', ?, ?)
               RETURNING id"#,
        )
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await
        .unwrap();
        row.0
    }

    #[tokio::test]
    async fn peek_respects_priority_then_fifo() {
        let (repo, pool) = setup().await;
        let now = Utc::now();
        let later = now + chrono::Duration::minutes(10);

        let b1 = seed_bot(&pool).await;
        let b2 = seed_bot(&pool).await;
        let b3 = seed_bot(&pool).await;

        // Same priority: FIFO. Lower priority value: drained first.
        repo.enqueue(b1, 100, now, later).await.unwrap();
        repo.enqueue(b2, 100, now + chrono::Duration::seconds(1), later)
            .await
            .unwrap();
        repo.enqueue(b3, 50, now + chrono::Duration::seconds(2), later)
            .await
            .unwrap();

        assert_eq!(repo.peek().await.unwrap().unwrap().bot_id, b3);
        assert_eq!(repo.position(b3).await.unwrap(), Some(1));
        assert_eq!(repo.position(b1).await.unwrap(), Some(2));
        assert_eq!(repo.position(b2).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn equal_keys_break_ties_by_row_id() {
        let (repo, pool) = setup().await;
        let now = Utc::now();
        let later = now + chrono::Duration::minutes(10);

        let b1 = seed_bot(&pool).await;
        let b2 = seed_bot(&pool).await;
        repo.enqueue(b1, 100, now, later).await.unwrap();
        repo.enqueue(b2, 100, now, later).await.unwrap();

        assert_eq!(repo.peek().await.unwrap().unwrap().bot_id, b1);
    }

    #[tokio::test]
    async fn take_expired_pops_only_past_deadlines() {
        let (repo, pool) = setup().await;
        let now = Utc::now();

        let expired_bot = seed_bot(&pool).await;
        let live_bot = seed_bot(&pool).await;
        repo.enqueue(expired_bot, 100, now - chrono::Duration::minutes(6), now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        repo.enqueue(live_bot, 100, now, now + chrono::Duration::minutes(5))
            .await
            .unwrap();

        let expired = repo.take_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].bot_id, expired_bot);
        assert_eq!(repo.len().await.unwrap(), 1);
        assert_eq!(repo.position(live_bot).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (repo, pool) = setup().await;
        let bot = seed_bot(&pool).await;
        let now = Utc::now();
        repo.enqueue(bot, 100, now, now + chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert!(repo.remove(bot).await.unwrap());
        assert!(!repo.remove(bot).await.unwrap());
    }
}
