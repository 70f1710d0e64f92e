//! Operator-facing bot operations.
//!
//! Create (behind the quota gate), deploy, cancel, remove-from-call,
//! list/inspect/delete, chat submission, and the termination path that
//! recycles slots and drains the queue.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{
    screenshot_key, Bot, BotStatus, ScreenshotRecord, ScreenshotType, SpeakerTimeframe, Tenant,
};
use crate::domain::ports::{
    ArtifactStore, BotFilter, BotRepository, ChatRepository, NewBot, ScreenshotRepository,
};
use crate::services::deployment::{DeployOutcome, DeploymentCoordinator};
use crate::services::pool_manager::PoolManager;
use crate::services::queue_manager::QueueManager;
use crate::services::quota::QuotaGate;

pub struct BotService {
    bots: Arc<dyn BotRepository>,
    chat: Arc<dyn ChatRepository>,
    screenshots: Arc<dyn ScreenshotRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    quota: Arc<QuotaGate>,
    coordinator: Arc<DeploymentCoordinator>,
    pool: Arc<PoolManager>,
    queue: Arc<QueueManager>,
}

impl BotService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bots: Arc<dyn BotRepository>,
        chat: Arc<dyn ChatRepository>,
        screenshots: Arc<dyn ScreenshotRepository>,
        artifacts: Arc<dyn ArtifactStore>,
        quota: Arc<QuotaGate>,
        coordinator: Arc<DeploymentCoordinator>,
        pool: Arc<PoolManager>,
        queue: Arc<QueueManager>,
    ) -> Self {
        Self {
            bots,
            chat,
            screenshots,
            artifacts,
            quota,
            coordinator,
            pool,
            queue,
        }
    }

    /// Admit against the daily quota, persist, and deploy right away
    /// when the start time is near (or absent).
    #[instrument(skip(self, tenant, new_bot), fields(tenant_id = tenant.id), err)]
    pub async fn create_bot(
        &self,
        tenant: &Tenant,
        new_bot: NewBot,
        queue_timeout_ms: Option<u64>,
    ) -> ControlPlaneResult<(Bot, Option<DeployOutcome>)> {
        self.quota.admit(tenant).await?;

        let bot = match self.bots.insert(new_bot).await {
            Ok(bot) => bot,
            Err(err) => {
                // The bot never existed; give the allowance back.
                if let Err(refund_err) = self.quota.refund(tenant).await {
                    warn!(tenant_id = tenant.id, error = %refund_err, "quota refund failed");
                }
                return Err(err);
            }
        };
        info!(bot_id = bot.id, tenant_id = tenant.id, "bot created");

        if bot.should_deploy_immediately(Utc::now()) {
            let outcome = self.coordinator.deploy(bot.id, queue_timeout_ms).await?;
            let bot = outcome.bot.clone();
            return Ok((bot, Some(outcome)));
        }

        Ok((bot, None))
    }

    /// Idempotent deploy trigger. A bot already past CREATED reports
    /// its current placement instead of deploying twice.
    #[instrument(skip(self, tenant), fields(tenant_id = tenant.id), err)]
    pub async fn deploy_bot(
        &self,
        tenant: &Tenant,
        bot_id: i64,
        queue_timeout_ms: Option<u64>,
    ) -> ControlPlaneResult<DeployOutcome> {
        let bot = self.owned_bot(tenant, bot_id).await?;

        if bot.status != BotStatus::Created {
            let queue_position = self.queue.position(bot_id).await?;
            return Ok(DeployOutcome {
                queued: bot.status == BotStatus::Queued,
                estimated_wait_ms: queue_position
                    .map(crate::domain::models::estimated_wait_ms),
                queue_position,
                bot,
            });
        }

        self.coordinator.deploy(bot_id, queue_timeout_ms).await
    }

    /// Cancel a bot that has not reached the call: CREATED, QUEUED or
    /// DEPLOYING becomes CANCELLED; queue entries are dropped and an
    /// assigned slot is stopped and recycled.
    #[instrument(skip(self, tenant), fields(tenant_id = tenant.id), err)]
    pub async fn cancel_deployment(&self, tenant: &Tenant, bot_id: i64) -> ControlPlaneResult<Bot> {
        let bot = self.owned_bot(tenant, bot_id).await?;

        if !bot.status.is_cancellable() {
            return Err(ControlPlaneError::InvalidStatusTransition {
                from: bot.status.to_string(),
                to: BotStatus::Cancelled.to_string(),
            });
        }

        if self.queue.remove(bot_id).await? {
            info!(bot_id, "queued bot removed on cancel");
        }
        self.pool.release(bot_id).await?;

        let cancelled = self
            .bots
            .transition_status(bot_id, BotStatus::Cancelled)
            .await?
            .ok_or_else(|| ControlPlaneError::InvalidStatusTransition {
                from: bot.status.to_string(),
                to: BotStatus::Cancelled.to_string(),
            })?;

        // A cancel can free a slot; hand it to the head waiter now
        // rather than waiting for the periodic drain.
        match self.coordinator.drain_queue().await {
            Ok(started) if started > 0 => info!(started, "queue drained after cancel"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "post-cancel drain failed"),
        }

        info!(bot_id, "deployment cancelled");
        Ok(cancelled)
    }

    /// Ask a running bot to leave gracefully; delivered through the
    /// next heartbeat response.
    #[instrument(skip(self, tenant), fields(tenant_id = tenant.id), err)]
    pub async fn remove_from_call(&self, tenant: &Tenant, bot_id: i64) -> ControlPlaneResult<()> {
        let bot = self.owned_bot(tenant, bot_id).await?;

        if bot.status.is_terminal() {
            return Err(ControlPlaneError::InvalidStatusTransition {
                from: bot.status.to_string(),
                to: "leave".to_string(),
            });
        }

        self.bots.set_leave_requested(bot_id, true).await?;
        info!(bot_id, "leave requested");
        Ok(())
    }

    /// Request a runtime log level change on the agent.
    pub async fn set_log_level(
        &self,
        tenant: &Tenant,
        bot_id: i64,
        level: &str,
    ) -> ControlPlaneResult<()> {
        self.owned_bot(tenant, bot_id).await?;
        self.bots.set_desired_log_level(bot_id, Some(level)).await
    }

    pub async fn list_bots(&self, tenant: &Tenant, filter: BotFilter) -> ControlPlaneResult<Vec<Bot>> {
        self.bots
            .list(BotFilter {
                tenant_id: Some(tenant.id),
                ..filter
            })
            .await
    }

    pub async fn get_bot(&self, tenant: &Tenant, bot_id: i64) -> ControlPlaneResult<Bot> {
        self.owned_bot(tenant, bot_id).await
    }

    pub async fn delete_bots(&self, tenant: &Tenant, ids: &[i64]) -> ControlPlaneResult<u64> {
        self.bots.delete(ids, tenant.id).await
    }

    pub async fn get_speaker_timeframes(
        &self,
        tenant: &Tenant,
        bot_id: i64,
    ) -> ControlPlaneResult<Vec<SpeakerTimeframe>> {
        let bot = self.owned_bot(tenant, bot_id).await?;
        Ok(bot.speaker_timeframes.unwrap_or_default())
    }

    /// Queue an outbound chat message for the bot to deliver.
    pub async fn submit_chat_message(
        &self,
        tenant: &Tenant,
        bot_id: i64,
        text: &str,
    ) -> ControlPlaneResult<()> {
        let bot = self.owned_bot(tenant, bot_id).await?;
        if !bot.chat_enabled {
            return Err(ControlPlaneError::ValidationFailed(
                "chat is not enabled for this bot".to_string(),
            ));
        }
        self.chat.enqueue(bot_id, text).await?;
        Ok(())
    }

    /// Store screenshot bytes and attach the metadata to the bot.
    pub async fn store_screenshot(
        &self,
        bot_id: i64,
        png_bytes: Vec<u8>,
        shot_type: ScreenshotType,
        bot_state: &str,
        trigger_event: Option<&str>,
    ) -> ControlPlaneResult<ScreenshotRecord> {
        let captured_at = Utc::now();
        let key = screenshot_key(bot_id, shot_type, captured_at);

        self.artifacts
            .put_object(&key, png_bytes, "image/png")
            .await?;
        self.screenshots
            .insert(bot_id, &key, shot_type, bot_state, trigger_event, captured_at)
            .await
    }

    /// Attach metadata for a screenshot whose bytes are already in the
    /// artifact store (agent-side uploads that bypassed the control
    /// plane).
    pub async fn attach_screenshot(
        &self,
        bot_id: i64,
        object_key: &str,
        shot_type: ScreenshotType,
        bot_state: &str,
        trigger_event: Option<&str>,
        captured_at: chrono::DateTime<Utc>,
    ) -> ControlPlaneResult<ScreenshotRecord> {
        self.screenshots
            .insert(bot_id, object_key, shot_type, bot_state, trigger_event, captured_at)
            .await
    }

    pub async fn signed_screenshot_url(
        &self,
        key: &str,
        ttl: std::time::Duration,
    ) -> ControlPlaneResult<String> {
        self.artifacts.get_signed_url(key, ttl).await
    }

    pub async fn list_screenshots(
        &self,
        tenant: &Tenant,
        bot_id: i64,
    ) -> ControlPlaneResult<Vec<ScreenshotRecord>> {
        self.owned_bot(tenant, bot_id).await?;
        self.screenshots.list_for_bot(bot_id).await
    }

    /// Recycle the terminated bot's slot, then hand freed capacity to
    /// the queue. Release strictly precedes the drain so the head
    /// waiter sees the slot.
    #[instrument(skip(self), err)]
    pub async fn handle_termination(&self, bot_id: i64) -> ControlPlaneResult<()> {
        self.pool.release(bot_id).await?;
        match self.coordinator.drain_queue().await {
            Ok(started) if started > 0 => info!(started, "queue drained after termination"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "post-termination drain failed"),
        }
        Ok(())
    }

    async fn owned_bot(&self, tenant: &Tenant, bot_id: i64) -> ControlPlaneResult<Bot> {
        let bot = self
            .bots
            .get(bot_id)
            .await?
            .ok_or(ControlPlaneError::BotNotFound(bot_id))?;

        if bot.tenant_id != tenant.id {
            return Err(ControlPlaneError::Unauthorized(format!(
                "bot {bot_id} does not belong to tenant {}",
                tenant.id
            )));
        }
        Ok(bot)
    }
}
