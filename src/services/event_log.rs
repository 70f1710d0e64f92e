//! Event log and status projection.
//!
//! Every reported event is appended; status-class events additionally
//! advance the bot's status projection through the repository's
//! terminal-monotonic transition guard. DONE and FATAL notify the
//! tenant's callback URL on an independent task.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{Bot, BotEvent, BotStatus, EventData, EventType, SpeakerTimeframe};
use crate::domain::ports::{BotRepository, EventRepository};

pub struct EventLog {
    bots: Arc<dyn BotRepository>,
    events: Arc<dyn EventRepository>,
    http: reqwest::Client,
}

impl EventLog {
    pub fn new(bots: Arc<dyn BotRepository>, events: Arc<dyn EventRepository>) -> Self {
        Self {
            bots,
            events,
            http: reqwest::Client::new(),
        }
    }

    /// Append an event and, for status-class events, project the new
    /// status. A projection refused by the terminal guard is logged and
    /// otherwise ignored; the event stays in the log.
    #[instrument(skip(self, data), err)]
    pub async fn record(
        &self,
        bot_id: i64,
        event_type: EventType,
        event_time: DateTime<Utc>,
        data: EventData,
    ) -> ControlPlaneResult<BotEvent> {
        let event = self.events.append(bot_id, event_type, event_time, data).await?;

        if let Some(status) = event_type.status() {
            self.project(bot_id, status).await?;
        }

        Ok(event)
    }

    /// Direct status update from the agent's `update-status` call.
    /// `recording` is mandatory when a recording-enabled bot reaches
    /// DONE.
    #[instrument(skip(self, speaker_timeframes), err)]
    pub async fn update_status(
        &self,
        bot_id: i64,
        status: BotStatus,
        recording_key: Option<String>,
        speaker_timeframes: Option<Vec<SpeakerTimeframe>>,
    ) -> ControlPlaneResult<Option<Bot>> {
        if status == BotStatus::Done {
            let bot = self
                .bots
                .get(bot_id)
                .await?
                .ok_or(ControlPlaneError::BotNotFound(bot_id))?;
            if bot.recording_enabled && recording_key.is_none() {
                return Err(ControlPlaneError::ValidationFailed(
                    "recording key required for DONE on a recording-enabled bot".to_string(),
                ));
            }
        }

        let projected = self.project(bot_id, status).await?;

        // Artifacts attach only once the transition actually landed, so
        // a refused projection cannot leave a recording key on a bot
        // that never reached DONE.
        if projected.is_some() && (recording_key.is_some() || speaker_timeframes.is_some()) {
            self.bots
                .finalize(bot_id, recording_key, speaker_timeframes)
                .await?;
        }

        match projected {
            Some(_) => Ok(self.bots.get(bot_id).await?),
            None => Ok(None),
        }
    }

    async fn project(&self, bot_id: i64, status: BotStatus) -> ControlPlaneResult<Option<Bot>> {
        match self.bots.transition_status(bot_id, status).await? {
            Some(bot) => {
                info!(bot_id, status = %status, "status projected");
                if matches!(status, BotStatus::Done | BotStatus::Fatal) {
                    self.notify_callback(&bot);
                }
                Ok(Some(bot))
            }
            None => {
                debug!(bot_id, status = %status, "projection refused (terminal or illegal)");
                Ok(None)
            }
        }
    }

    /// Fire-and-forget POST to the bot's callback URL. Failure is
    /// logged; it never propagates to the event path.
    fn notify_callback(&self, bot: &Bot) {
        let Some(url) = bot.callback_url.clone() else {
            return;
        };
        let payload = json!({ "botId": bot.id, "status": bot.status.as_str() });
        let http = self.http.clone();
        let bot_id = bot.id;

        tokio::spawn(async move {
            match http.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(bot_id, %url, "callback delivered");
                }
                Ok(response) => {
                    warn!(bot_id, %url, status = %response.status(), "callback rejected");
                }
                Err(err) => {
                    warn!(bot_id, %url, error = %err, "callback failed");
                }
            }
        });
    }

    pub async fn events_for_bot(&self, bot_id: i64) -> ControlPlaneResult<Vec<BotEvent>> {
        self.events.list_for_bot(bot_id).await
    }

    pub async fn latest_status_event(
        &self,
        bot_id: i64,
    ) -> ControlPlaneResult<Option<BotEvent>> {
        self.events.latest_status_event(bot_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        connection::create_test_pool, migrations, SqliteBotRepository, SqliteEventRepository,
    };
    use crate::domain::models::{AutomaticLeave, MeetingInfo, MeetingPlatform};
    use crate::domain::ports::NewBot;

    async fn setup() -> (EventLog, Arc<SqliteBotRepository>) {
        let pool = create_test_pool().await.unwrap();
        migrations::migrate(&pool).await.unwrap();
        sqlx::query("INSERT INTO tenants (name, plan, timezone) VALUES ('t', 'free', 'UTC')")
            .execute(&pool)
            .await
            .unwrap();
        let bots = Arc::new(SqliteBotRepository::new(pool.clone()));
        let events = Arc::new(SqliteEventRepository::new(pool));
        (EventLog::new(bots.clone(), events), bots)
    }

    async fn seed_bot(bots: &SqliteBotRepository, recording: bool) -> Bot {
        bots.insert(NewBot {
            tenant_id: 1,
            meeting_info: MeetingInfo {
                platform: MeetingPlatform::Meet,
                url: "https://meet.example".into(),
                credentials: None,
            },
            meeting_title: "m".into(),
            display_name: "bot".into(),
            scheduled_start: None,
            scheduled_end: None,
            recording_enabled: recording,
            chat_enabled: false,
            heartbeat_interval_ms: 10_000,
            automatic_leave: AutomaticLeave::default(),
            callback_url: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn status_class_event_moves_the_projection() {
        let (log, bots) = setup().await;
        let bot = seed_bot(&bots, false).await;

        log.record(bot.id, EventType::Deploying, Utc::now(), EventData::default())
            .await
            .unwrap();
        log.record(bot.id, EventType::JoiningCall, Utc::now(), EventData::default())
            .await
            .unwrap();

        let bot = bots.get(bot.id).await.unwrap().unwrap();
        assert_eq!(bot.status, BotStatus::JoiningCall);
    }

    #[tokio::test]
    async fn log_only_event_leaves_status_untouched() {
        let (log, bots) = setup().await;
        let bot = seed_bot(&bots, false).await;

        log.record(
            bot.id,
            EventType::ParticipantJoin,
            Utc::now(),
            EventData::description("Ada"),
        )
        .await
        .unwrap();

        assert_eq!(
            bots.get(bot.id).await.unwrap().unwrap().status,
            BotStatus::Created
        );
        assert_eq!(log.events_for_bot(bot.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn terminal_bot_keeps_accepting_events_without_projection() {
        let (log, bots) = setup().await;
        let bot = seed_bot(&bots, false).await;

        log.record(bot.id, EventType::Fatal, Utc::now(), EventData::default())
            .await
            .unwrap();
        // The agent may still be flushing events; the log accepts them,
        // the status stays FATAL.
        log.record(bot.id, EventType::Done, Utc::now(), EventData::default())
            .await
            .unwrap();

        assert_eq!(
            bots.get(bot.id).await.unwrap().unwrap().status,
            BotStatus::Fatal
        );
        assert_eq!(log.events_for_bot(bot.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn done_requires_recording_key_when_recording_enabled() {
        let (log, bots) = setup().await;
        let bot = seed_bot(&bots, true).await;

        let err = log
            .update_status(bot.id, BotStatus::Done, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlPlaneError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn update_status_records_artifacts() {
        let (log, bots) = setup().await;
        let bot = seed_bot(&bots, true).await;

        // Drive to CALL_ENDED first so DONE is a legal transition.
        for status in [
            EventType::Deploying,
            EventType::JoiningCall,
            EventType::InCall,
            EventType::CallEnded,
        ] {
            log.record(bot.id, status, Utc::now(), EventData::default())
                .await
                .unwrap();
        }

        log.update_status(
            bot.id,
            BotStatus::Done,
            Some("recordings/xyz-meet-recording.mp4".into()),
            Some(vec![SpeakerTimeframe {
                speaker: "Ada".into(),
                start_ms: 0,
                end_ms: 1_000,
            }]),
        )
        .await
        .unwrap();

        let bot = bots.get(bot.id).await.unwrap().unwrap();
        assert_eq!(bot.status, BotStatus::Done);
        assert!(bot.recording_key.is_some());
        assert_eq!(bot.speaker_timeframes.unwrap().len(), 1);
    }
}
