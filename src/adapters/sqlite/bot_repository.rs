//! SQLite implementation of the BotRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{
    AutomaticLeave, Bot, BotStatus, MeetingCredentials, MeetingInfo, MeetingPlatform,
    SpeakerTimeframe,
};
use crate::domain::ports::{BotFilter, BotRepository, NewBot};

#[derive(Clone)]
pub struct SqliteBotRepository {
    pool: SqlitePool,
}

impl SqliteBotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BotRow {
    id: i64,
    tenant_id: i64,
    platform: String,
    meeting_url: String,
    meeting_credentials: Option<String>,
    meeting_title: String,
    display_name: String,
    scheduled_start: Option<String>,
    scheduled_end: Option<String>,
    recording_enabled: bool,
    chat_enabled: bool,
    heartbeat_interval_ms: i64,
    automatic_leave: String,
    callback_url: Option<String>,
    status: String,
    last_heartbeat: Option<String>,
    deployment_platform: Option<String>,
    platform_identifier: Option<String>,
    recording_key: Option<String>,
    speaker_timeframes: Option<String>,
    deployment_error: Option<String>,
    created_at: String,
    updated_at: String,
}

fn parse_ts(raw: &str) -> ControlPlaneResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ControlPlaneError::Database(format!("bad timestamp {raw:?}: {e}")))
}

fn parse_opt_ts(raw: Option<&str>) -> ControlPlaneResult<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}

impl TryFrom<BotRow> for Bot {
    type Error = ControlPlaneError;

    fn try_from(row: BotRow) -> Result<Self, Self::Error> {
        let platform = MeetingPlatform::from_str(&row.platform)
            .ok_or_else(|| ControlPlaneError::PlatformUnsupported(row.platform.clone()))?;
        let credentials: Option<MeetingCredentials> = row
            .meeting_credentials
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let automatic_leave: AutomaticLeave = serde_json::from_str(&row.automatic_leave)?;
        let speaker_timeframes: Option<Vec<SpeakerTimeframe>> = row
            .speaker_timeframes
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let status = BotStatus::from_str(&row.status)
            .ok_or_else(|| ControlPlaneError::Database(format!("bad status {:?}", row.status)))?;

        Ok(Bot {
            id: row.id,
            tenant_id: row.tenant_id,
            meeting_info: MeetingInfo {
                platform,
                url: row.meeting_url,
                credentials,
            },
            meeting_title: row.meeting_title,
            display_name: row.display_name,
            scheduled_start: parse_opt_ts(row.scheduled_start.as_deref())?,
            scheduled_end: parse_opt_ts(row.scheduled_end.as_deref())?,
            recording_enabled: row.recording_enabled,
            chat_enabled: row.chat_enabled,
            heartbeat_interval_ms: row.heartbeat_interval_ms as u64,
            automatic_leave,
            callback_url: row.callback_url,
            status,
            last_heartbeat: parse_opt_ts(row.last_heartbeat.as_deref())?,
            deployment_platform: row.deployment_platform,
            platform_identifier: row.platform_identifier,
            recording_key: row.recording_key,
            speaker_timeframes,
            deployment_error: row.deployment_error,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

const BOT_COLUMNS: &str = "id, tenant_id, platform, meeting_url, meeting_credentials, \
     meeting_title, display_name, scheduled_start, scheduled_end, recording_enabled, \
     chat_enabled, heartbeat_interval_ms, automatic_leave, callback_url, status, \
     last_heartbeat, deployment_platform, platform_identifier, recording_key, \
     speaker_timeframes, deployment_error, created_at, updated_at";

#[async_trait]
impl BotRepository for SqliteBotRepository {
    async fn insert(&self, bot: NewBot) -> ControlPlaneResult<Bot> {
        let now = Utc::now();
        let credentials_json = bot
            .meeting_info
            .credentials
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let leave_json = serde_json::to_string(&bot.automatic_leave.clamped())?;

        let row: BotRow = sqlx::query_as(&format!(
            r#"INSERT INTO bots (tenant_id, platform, meeting_url, meeting_credentials,
               meeting_title, display_name, scheduled_start, scheduled_end,
               recording_enabled, chat_enabled, heartbeat_interval_ms, automatic_leave,
               callback_url, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'CREATED', ?, ?)
               RETURNING {BOT_COLUMNS}"#
        ))
        .bind(bot.tenant_id)
        .bind(bot.meeting_info.platform.as_str())
        .bind(&bot.meeting_info.url)
        .bind(credentials_json)
        .bind(&bot.meeting_title)
        .bind(&bot.display_name)
        .bind(bot.scheduled_start.map(|t| t.to_rfc3339()))
        .bind(bot.scheduled_end.map(|t| t.to_rfc3339()))
        .bind(bot.recording_enabled)
        .bind(bot.chat_enabled)
        .bind(bot.heartbeat_interval_ms as i64)
        .bind(leave_json)
        .bind(&bot.callback_url)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get(&self, id: i64) -> ControlPlaneResult<Option<Bot>> {
        let row: Option<BotRow> =
            sqlx::query_as(&format!("SELECT {BOT_COLUMNS} FROM bots WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: BotFilter) -> ControlPlaneResult<Vec<Bot>> {
        let mut query = format!("SELECT {BOT_COLUMNS} FROM bots WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(tenant_id) = filter.tenant_id {
            query.push_str(" AND tenant_id = ?");
            bindings.push(tenant_id.to_string());
        }
        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        query.push_str(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, BotRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<BotRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete(&self, ids: &[i64], tenant_id: i64) -> ControlPlaneResult<u64> {
        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM bots WHERE id = ? AND tenant_id = ?")
                .bind(id)
                .bind(tenant_id)
                .execute(&self.pool)
                .await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    async fn transition_status(
        &self,
        id: i64,
        to: BotStatus,
    ) -> ControlPlaneResult<Option<Bot>> {
        let Some(current) = self.get(id).await? else {
            return Err(ControlPlaneError::BotNotFound(id));
        };

        if !current.status.can_transition_to(to) {
            return Ok(None);
        }

        // Guard on the observed status so a racing writer (or a late
        // terminal transition) makes this a no-op instead of a
        // resurrection.
        let row: Option<BotRow> = sqlx::query_as(&format!(
            r#"UPDATE bots SET status = ?, updated_at = ?
               WHERE id = ? AND status = ?
                 AND status NOT IN ('DONE', 'FATAL', 'CANCELLED')
               RETURNING {BOT_COLUMNS}"#
        ))
        .bind(to.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(current.status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn finalize(
        &self,
        id: i64,
        recording_key: Option<String>,
        speaker_timeframes: Option<Vec<SpeakerTimeframe>>,
    ) -> ControlPlaneResult<()> {
        let timeframes_json = speaker_timeframes
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "UPDATE bots SET recording_key = COALESCE(?, recording_key),
             speaker_timeframes = COALESCE(?, speaker_timeframes), updated_at = ?
             WHERE id = ?",
        )
        .bind(recording_key)
        .bind(timeframes_json)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_deployment(
        &self,
        id: i64,
        deployment_platform: &str,
        platform_identifier: &str,
    ) -> ControlPlaneResult<()> {
        let result = sqlx::query(
            "UPDATE bots SET deployment_platform = ?, platform_identifier = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(deployment_platform)
        .bind(platform_identifier)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ControlPlaneError::BotNotFound(id));
        }
        Ok(())
    }

    async fn set_deployment_error(&self, id: i64, message: &str) -> ControlPlaneResult<()> {
        sqlx::query("UPDATE bots SET deployment_error = ?, updated_at = ? WHERE id = ?")
            .bind(message)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_heartbeat(&self, id: i64, at: DateTime<Utc>) -> ControlPlaneResult<()> {
        let result = sqlx::query("UPDATE bots SET last_heartbeat = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ControlPlaneError::BotNotFound(id));
        }
        Ok(())
    }

    async fn set_leave_requested(&self, id: i64, requested: bool) -> ControlPlaneResult<()> {
        let result = sqlx::query("UPDATE bots SET leave_requested = ? WHERE id = ?")
            .bind(requested)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ControlPlaneError::BotNotFound(id));
        }
        Ok(())
    }

    async fn set_desired_log_level(
        &self,
        id: i64,
        level: Option<&str>,
    ) -> ControlPlaneResult<()> {
        let result = sqlx::query("UPDATE bots SET desired_log_level = ? WHERE id = ?")
            .bind(level)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ControlPlaneError::BotNotFound(id));
        }
        Ok(())
    }

    async fn take_heartbeat_intent(
        &self,
        id: i64,
    ) -> ControlPlaneResult<(bool, Option<String>)> {
        // The log level is delivered once; the leave flag stays set so
        // a lost response is re-delivered on the next beat.
        let row: Option<(bool, Option<String>)> =
            sqlx::query_as("SELECT leave_requested, desired_log_level FROM bots WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let (leave, level) = row.ok_or(ControlPlaneError::BotNotFound(id))?;
        if level.is_some() {
            sqlx::query("UPDATE bots SET desired_log_level = NULL WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok((leave, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{connection::create_test_pool, migrations};
    use crate::domain::models::MeetingPlatform;

    async fn setup() -> SqliteBotRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::migrate(&pool).await.unwrap();
        sqlx::query("INSERT INTO tenants (name, plan, timezone) VALUES ('t', 'free', 'UTC')")
            .execute(&pool)
            .await
            .unwrap();
        SqliteBotRepository::new(pool)
    }

    fn new_bot() -> NewBot {
        NewBot {
            tenant_id: 1,
            meeting_info: MeetingInfo {
                platform: MeetingPlatform::Meet,
                url: "https://meet.google.com/abc-defg-hij".into(),
                credentials: None,
            },
            meeting_title: "Standup".into(),
            display_name: "Notetaker".into(),
            scheduled_start: None,
            scheduled_end: None,
            recording_enabled: true,
            chat_enabled: false,
            heartbeat_interval_ms: 10_000,
            automatic_leave: AutomaticLeave::default(),
            callback_url: None,
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let repo = setup().await;
        let bot = repo.insert(new_bot()).await.unwrap();
        assert_eq!(bot.status, BotStatus::Created);

        let fetched = repo.get(bot.id).await.unwrap().unwrap();
        assert_eq!(fetched.meeting_info.platform, MeetingPlatform::Meet);
        assert_eq!(fetched.display_name, "Notetaker");
        assert!(fetched.recording_enabled);
        assert!(fetched.last_heartbeat.is_none());
    }

    #[tokio::test]
    async fn automatic_leave_clamped_on_insert() {
        let repo = setup().await;
        let mut bot = new_bot();
        bot.automatic_leave.waiting_room_timeout_ms = 5;
        let inserted = repo.insert(bot).await.unwrap();
        assert_eq!(
            inserted.automatic_leave.waiting_room_timeout_ms,
            crate::domain::models::MIN_LEAVE_TIMEOUT_MS
        );
    }

    #[tokio::test]
    async fn legal_transition_succeeds() {
        let repo = setup().await;
        let bot = repo.insert(new_bot()).await.unwrap();
        let updated = repo
            .transition_status(bot.id, BotStatus::Deploying)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, BotStatus::Deploying);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let repo = setup().await;
        let bot = repo.insert(new_bot()).await.unwrap();
        // CREATED cannot jump straight to IN_CALL.
        let result = repo.transition_status(bot.id, BotStatus::InCall).await.unwrap();
        assert!(result.is_none());
        assert_eq!(
            repo.get(bot.id).await.unwrap().unwrap().status,
            BotStatus::Created
        );
    }

    #[tokio::test]
    async fn terminal_status_is_monotonic() {
        let repo = setup().await;
        let bot = repo.insert(new_bot()).await.unwrap();
        repo.transition_status(bot.id, BotStatus::Fatal).await.unwrap().unwrap();

        for next in [BotStatus::Deploying, BotStatus::Done, BotStatus::Cancelled] {
            let result = repo.transition_status(bot.id, next).await.unwrap();
            assert!(result.is_none(), "FATAL bot accepted {next}");
        }
        assert_eq!(
            repo.get(bot.id).await.unwrap().unwrap().status,
            BotStatus::Fatal
        );
    }

    #[tokio::test]
    async fn missing_bot_is_an_error() {
        let repo = setup().await;
        let err = repo.transition_status(999, BotStatus::Deploying).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::BotNotFound(999)));
    }

    #[tokio::test]
    async fn heartbeat_intent_delivers_log_level_once() {
        let repo = setup().await;
        let bot = repo.insert(new_bot()).await.unwrap();
        repo.set_desired_log_level(bot.id, Some("debug")).await.unwrap();
        repo.set_leave_requested(bot.id, true).await.unwrap();

        let (leave, level) = repo.take_heartbeat_intent(bot.id).await.unwrap();
        assert!(leave);
        assert_eq!(level.as_deref(), Some("debug"));

        // Level was consumed; leave intent persists.
        let (leave, level) = repo.take_heartbeat_intent(bot.id).await.unwrap();
        assert!(leave);
        assert_eq!(level, None);
    }

    #[tokio::test]
    async fn finalize_records_artifacts() {
        let repo = setup().await;
        let bot = repo.insert(new_bot()).await.unwrap();
        repo.finalize(
            bot.id,
            Some("recordings/abc-meet-recording.mp4".into()),
            Some(vec![SpeakerTimeframe {
                speaker: "Ada".into(),
                start_ms: 0,
                end_ms: 4_000,
            }]),
        )
        .await
        .unwrap();

        let bot = repo.get(bot.id).await.unwrap().unwrap();
        assert_eq!(
            bot.recording_key.as_deref(),
            Some("recordings/abc-meet-recording.mp4")
        );
        assert_eq!(bot.speaker_timeframes.unwrap().len(), 1);
    }
}
