//! Deployment queue manager.
//!
//! Priority-then-FIFO waiting area for bots when the pool is
//! saturated. Entries carry a deadline that is honored even when the
//! submitting handler is long gone.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::errors::ControlPlaneResult;
use crate::domain::models::{
    clamp_queue_timeout_ms, estimated_wait_ms, BotStatus, EventData, EventType, QueueEntry,
    SUB_CODE_QUEUE_TIMEOUT,
};
use crate::domain::ports::QueueRepository;
use crate::services::event_log::EventLog;
use crate::services::pool_manager::PoolManager;

/// Message recorded on bots that expire in the queue.
pub const QUEUE_TIMEOUT_MESSAGE: &str = "queue timeout: no slot freed before the deadline";

/// Outcome of one drain pass. Each assignment still needs its slot
/// configured and started by the caller.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub expired: usize,
    pub assignments: Vec<(crate::domain::models::Bot, crate::domain::models::PoolSlot)>,
}

pub struct QueueManager {
    queue: Arc<dyn QueueRepository>,
    events: Arc<EventLog>,
    bots: Arc<dyn crate::domain::ports::BotRepository>,
}

impl QueueManager {
    pub fn new(
        queue: Arc<dyn QueueRepository>,
        events: Arc<EventLog>,
        bots: Arc<dyn crate::domain::ports::BotRepository>,
    ) -> Self {
        Self { queue, events, bots }
    }

    /// Park a bot until a slot frees. Returns the entry plus its
    /// 1-indexed position and a coarse wait estimate.
    #[instrument(skip(self), err)]
    pub async fn enqueue(
        &self,
        bot_id: i64,
        priority: i32,
        timeout_ms: u64,
    ) -> ControlPlaneResult<(QueueEntry, u64, u64)> {
        let now = Utc::now();
        let timeout_ms = clamp_queue_timeout_ms(timeout_ms);
        let timeout_at = now + Duration::milliseconds(timeout_ms as i64);

        let entry = self.queue.enqueue(bot_id, priority, now, timeout_at).await?;
        self.bots.transition_status(bot_id, BotStatus::Queued).await?;

        let position = self.queue.position(bot_id).await?.unwrap_or(1);
        let estimate = estimated_wait_ms(position);
        info!(bot_id, position, timeout_ms, "bot queued");
        Ok((entry, position, estimate))
    }

    pub async fn position(&self, bot_id: i64) -> ControlPlaneResult<Option<u64>> {
        self.queue.position(bot_id).await
    }

    pub async fn remove(&self, bot_id: i64) -> ControlPlaneResult<bool> {
        self.queue.remove(bot_id).await
    }

    pub async fn len(&self) -> ControlPlaneResult<u64> {
        self.queue.len().await
    }

    /// Drain pass: fail expired entries, then hand slots to waiters in
    /// canonical order until the pool saturates again. Env construction
    /// and container start belong to the deployment coordinator, which
    /// completes each returned assignment.
    #[instrument(skip(self, pool), err)]
    pub async fn drain(&self, pool: &PoolManager) -> ControlPlaneResult<DrainReport> {
        let mut report = DrainReport::default();

        // 1. Purge expired entries; their bots go FATAL.
        for entry in self.queue.take_expired(Utc::now()).await? {
            warn!(bot_id = entry.bot_id, "queue entry expired");
            self.bots
                .set_deployment_error(entry.bot_id, QUEUE_TIMEOUT_MESSAGE)
                .await?;
            self.events
                .record(
                    entry.bot_id,
                    EventType::Fatal,
                    Utc::now(),
                    EventData {
                        description: Some(QUEUE_TIMEOUT_MESSAGE.to_string()),
                        sub_code: Some(SUB_CODE_QUEUE_TIMEOUT.to_string()),
                    },
                )
                .await?;
            report.expired += 1;
        }

        // 2. Assign slots head-first until acquisition fails.
        while let Some(head) = self.queue.peek().await? {
            let Some(bot) = self.bots.get(head.bot_id).await? else {
                // Bot deleted while queued; drop the entry.
                self.queue.remove(head.bot_id).await?;
                continue;
            };

            let Some(slot) = pool.acquire(bot.meeting_info.platform, bot.id).await? else {
                break;
            };

            self.queue.remove(bot.id).await?;
            info!(bot_id = bot.id, slot = %slot.slot_name, "queued bot assigned to slot");
            report.assignments.push((bot, slot));
        }

        Ok(report)
    }
}
