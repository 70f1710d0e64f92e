//! SQLite implementation of the SlotRepository.
//!
//! The acquire path is a single `UPDATE ... WHERE id = (SELECT ...)`
//! with `RETURNING`: SQLite's single-writer execution makes the select
//! and the claim one atomic step, so concurrent acquirers always land
//! on distinct slots. This is the engine's equivalent of
//! select-for-update-skip-locked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{MeetingPlatform, PoolSlot, SlotStatus};
use crate::domain::ports::SlotRepository;

#[derive(Clone)]
pub struct SqliteSlotRepository {
    pool: SqlitePool,
}

impl SqliteSlotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: i64,
    slot_name: String,
    service_id: String,
    platform: String,
    status: String,
    assigned_bot_id: Option<i64>,
    last_used_at: String,
    recovery_attempts: i32,
    error_message: Option<String>,
    created_at: String,
}

impl TryFrom<SlotRow> for PoolSlot {
    type Error = ControlPlaneError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let platform = MeetingPlatform::from_str(&row.platform)
            .ok_or_else(|| ControlPlaneError::PlatformUnsupported(row.platform.clone()))?;
        let status = SlotStatus::from_str(&row.status)
            .ok_or_else(|| ControlPlaneError::Database(format!("bad slot status {:?}", row.status)))?;
        let parse = |raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ControlPlaneError::Database(format!("bad timestamp {raw:?}: {e}")))
        };

        Ok(PoolSlot {
            id: row.id,
            slot_name: row.slot_name,
            service_id: row.service_id,
            platform,
            status,
            assigned_bot_id: row.assigned_bot_id,
            last_used_at: parse(&row.last_used_at)?,
            recovery_attempts: row.recovery_attempts,
            error_message: row.error_message,
            created_at: parse(&row.created_at)?,
        })
    }
}

const SLOT_COLUMNS: &str = "id, slot_name, service_id, platform, status, assigned_bot_id, \
     last_used_at, recovery_attempts, error_message, created_at";

#[async_trait]
impl SlotRepository for SqliteSlotRepository {
    async fn acquire_idle(
        &self,
        platform: MeetingPlatform,
        bot_id: i64,
        now: DateTime<Utc>,
    ) -> ControlPlaneResult<Option<PoolSlot>> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            r#"UPDATE pool_slots
               SET status = 'busy', assigned_bot_id = ?, last_used_at = ?
               WHERE id = (
                   SELECT id FROM pool_slots
                   WHERE status = 'idle' AND platform = ?
                   ORDER BY last_used_at ASC, id ASC
                   LIMIT 1
               )
               RETURNING {SLOT_COLUMNS}"#
        ))
        .bind(bot_id)
        .bind(now.to_rfc3339())
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(
        &self,
        slot_name: &str,
        service_id: &str,
        platform: MeetingPlatform,
        bot_id: i64,
        now: DateTime<Utc>,
    ) -> ControlPlaneResult<PoolSlot> {
        let row: SlotRow = sqlx::query_as(&format!(
            r#"INSERT INTO pool_slots
               (slot_name, service_id, platform, status, assigned_bot_id, last_used_at,
                recovery_attempts, created_at)
               VALUES (?, ?, ?, 'deploying', ?, ?, 0, ?)
               RETURNING {SLOT_COLUMNS}"#
        ))
        .bind(slot_name)
        .bind(service_id)
        .bind(platform.as_str())
        .bind(bot_id)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get(&self, id: i64) -> ControlPlaneResult<Option<PoolSlot>> {
        let row: Option<SlotRow> =
            sqlx::query_as(&format!("SELECT {SLOT_COLUMNS} FROM pool_slots WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_bot(&self, bot_id: i64) -> ControlPlaneResult<Option<PoolSlot>> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            "SELECT {SLOT_COLUMNS} FROM pool_slots WHERE assigned_bot_id = ?"
        ))
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> ControlPlaneResult<Vec<PoolSlot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            "SELECT {SLOT_COLUMNS} FROM pool_slots ORDER BY slot_name"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self, platform: MeetingPlatform) -> ControlPlaneResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM pool_slots WHERE platform = ?")
                .bind(platform.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn mark_busy(
        &self,
        id: i64,
        bot_id: i64,
        now: DateTime<Utc>,
    ) -> ControlPlaneResult<()> {
        sqlx::query(
            "UPDATE pool_slots SET status = 'busy', assigned_bot_id = ?, last_used_at = ?
             WHERE id = ?",
        )
        .bind(bot_id)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release(&self, id: i64, now: DateTime<Utc>) -> ControlPlaneResult<()> {
        sqlx::query(
            "UPDATE pool_slots SET status = 'idle', assigned_bot_id = NULL,
             last_used_at = ?, error_message = NULL, recovery_attempts = 0
             WHERE id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_error(&self, id: i64, message: &str) -> ControlPlaneResult<()> {
        sqlx::query("UPDATE pool_slots SET status = 'error', error_message = ? WHERE id = ?")
            .bind(message)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_recoverable(
        &self,
        stale_before: DateTime<Utc>,
    ) -> ControlPlaneResult<Vec<PoolSlot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            r#"SELECT {SLOT_COLUMNS} FROM pool_slots
               WHERE status = 'error'
                  OR (status = 'deploying' AND last_used_at < ?)
               ORDER BY id"#
        ))
        .bind(stale_before.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn increment_recovery_attempts(&self, id: i64) -> ControlPlaneResult<()> {
        sqlx::query("UPDATE pool_slots SET recovery_attempts = recovery_attempts + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> ControlPlaneResult<()> {
        sqlx::query("DELETE FROM pool_slots WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_status(&self, id: i64, status: SlotStatus) -> ControlPlaneResult<()> {
        sqlx::query("UPDATE pool_slots SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
