//! SQLite implementation of the screenshot metadata repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{ScreenshotRecord, ScreenshotType};
use crate::domain::ports::ScreenshotRepository;

#[derive(Clone)]
pub struct SqliteScreenshotRepository {
    pool: SqlitePool,
}

impl SqliteScreenshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScreenshotRow {
    id: i64,
    bot_id: i64,
    object_key: String,
    shot_type: String,
    bot_state: String,
    trigger_event: Option<String>,
    captured_at: String,
}

impl TryFrom<ScreenshotRow> for ScreenshotRecord {
    type Error = ControlPlaneError;

    fn try_from(row: ScreenshotRow) -> Result<Self, Self::Error> {
        let shot_type = ScreenshotType::from_str(&row.shot_type).ok_or_else(|| {
            ControlPlaneError::Database(format!("bad screenshot type {:?}", row.shot_type))
        })?;
        let captured_at = DateTime::parse_from_rfc3339(&row.captured_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ControlPlaneError::Database(format!("bad timestamp: {e}")))?;

        Ok(ScreenshotRecord {
            id: row.id,
            bot_id: row.bot_id,
            object_key: row.object_key,
            shot_type,
            bot_state: row.bot_state,
            trigger_event: row.trigger_event,
            captured_at,
        })
    }
}

#[async_trait]
impl ScreenshotRepository for SqliteScreenshotRepository {
    async fn insert(
        &self,
        bot_id: i64,
        object_key: &str,
        shot_type: ScreenshotType,
        bot_state: &str,
        trigger_event: Option<&str>,
        captured_at: DateTime<Utc>,
    ) -> ControlPlaneResult<ScreenshotRecord> {
        let row: ScreenshotRow = sqlx::query_as(
            r#"INSERT INTO screenshots
               (bot_id, object_key, shot_type, bot_state, trigger_event, captured_at)
               VALUES (?, ?, ?, ?, ?, ?)
               RETURNING id, bot_id, object_key, shot_type, bot_state, trigger_event, captured_at"#,
        )
        .bind(bot_id)
        .bind(object_key)
        .bind(shot_type.as_str())
        .bind(bot_state)
        .bind(trigger_event)
        .bind(captured_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_for_bot(&self, bot_id: i64) -> ControlPlaneResult<Vec<ScreenshotRecord>> {
        let rows: Vec<ScreenshotRow> = sqlx::query_as(
            "SELECT id, bot_id, object_key, shot_type, bot_state, trigger_event, captured_at
             FROM screenshots WHERE bot_id = ? ORDER BY captured_at, id",
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
