//! SQLite implementation of the append-only event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{BotEvent, EventData, EventType};
use crate::domain::ports::EventRepository;

#[derive(Clone)]
pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    bot_id: i64,
    event_type: String,
    event_time: String,
    description: Option<String>,
    sub_code: Option<String>,
}

impl TryFrom<EventRow> for BotEvent {
    type Error = ControlPlaneError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_type = EventType::from_str(&row.event_type).ok_or_else(|| {
            ControlPlaneError::Database(format!("bad event type {:?}", row.event_type))
        })?;
        let event_time = DateTime::parse_from_rfc3339(&row.event_time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ControlPlaneError::Database(format!("bad event time: {e}")))?;

        Ok(BotEvent {
            id: row.id,
            bot_id: row.bot_id,
            event_type,
            event_time,
            data: EventData {
                description: row.description,
                sub_code: row.sub_code,
            },
        })
    }
}

const EVENT_COLUMNS: &str = "id, bot_id, event_type, event_time, description, sub_code";

/// Status-class tokens, for projection queries.
const STATUS_CLASS_TOKENS: &str =
    "'DEPLOYING', 'JOINING_CALL', 'IN_WAITING_ROOM', 'IN_CALL', 'CALL_ENDED', 'DONE', 'FATAL'";

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn append(
        &self,
        bot_id: i64,
        event_type: EventType,
        event_time: DateTime<Utc>,
        data: EventData,
    ) -> ControlPlaneResult<BotEvent> {
        let row: EventRow = sqlx::query_as(&format!(
            r#"INSERT INTO bot_events (bot_id, event_type, event_time, description, sub_code)
               VALUES (?, ?, ?, ?, ?)
               RETURNING {EVENT_COLUMNS}"#
        ))
        .bind(bot_id)
        .bind(event_type.as_str())
        .bind(event_time.to_rfc3339())
        .bind(&data.description)
        .bind(&data.sub_code)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_for_bot(&self, bot_id: i64) -> ControlPlaneResult<Vec<BotEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM bot_events WHERE bot_id = ? ORDER BY event_time, id"
        ))
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn latest_status_event(&self, bot_id: i64) -> ControlPlaneResult<Option<BotEvent>> {
        let row: Option<EventRow> = sqlx::query_as(&format!(
            r#"SELECT {EVENT_COLUMNS} FROM bot_events
               WHERE bot_id = ? AND event_type IN ({STATUS_CLASS_TOKENS})
               ORDER BY event_time DESC, id DESC
               LIMIT 1"#
        ))
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{connection::create_test_pool, migrations};

    async fn setup() -> (SqliteEventRepository, SqlitePool) {
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
        (SqliteEventRepository::new(pool.clone()), pool)
    }

    #[tokio::test]
    async fn append_and_list_preserve_time_order() {
        let (repo, _pool) = setup().await;
        let base = Utc::now();

        repo.append(1, EventType::JoiningCall, base, EventData::default())
            .await
            .unwrap();
        repo.append(
            1,
            EventType::ParticipantJoin,
            base + chrono::Duration::seconds(5),
            EventData::description("Ada joined"),
        )
        .await
        .unwrap();
        repo.append(
            1,
            EventType::InCall,
            base + chrono::Duration::seconds(2),
            EventData::default(),
        )
        .await
        .unwrap();

        let events = repo.list_for_bot(1).await.unwrap();
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![EventType::JoiningCall, EventType::InCall, EventType::ParticipantJoin]
        );
    }

    #[tokio::test]
    async fn latest_status_event_skips_log_only_events() {
        let (repo, _pool) = setup().await;
        let base = Utc::now();

        repo.append(1, EventType::InCall, base, EventData::default())
            .await
            .unwrap();
        repo.append(
            1,
            EventType::ParticipantLeave,
            base + chrono::Duration::seconds(30),
            EventData::default(),
        )
        .await
        .unwrap();

        let latest = repo.latest_status_event(1).await.unwrap().unwrap();
        assert_eq!(latest.event_type, EventType::InCall);
    }

    #[tokio::test]
    async fn no_status_events_yields_none() {
        let (repo, _pool) = setup().await;
        repo.append(1, EventType::Log, Utc::now(), EventData::description("hi"))
            .await
            .unwrap();
        assert!(repo.latest_status_event(1).await.unwrap().is_none());
    }
}
