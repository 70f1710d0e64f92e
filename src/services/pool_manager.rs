//! Warm pool manager.
//!
//! Owns the slot set: atomic assignment of idle slots, growth up to the
//! pool cap, release on termination, and error marking. Slot rows are
//! only ever mutated here and in the recovery worker.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{ImageConfig, MeetingPlatform, PoolSlot, SlotStatus};
use crate::domain::ports::{ContainerOrchestrator, SlotRepository};

/// Env marker present on freshly provisioned slots before any tenancy.
const PLACEHOLDER_ENV_VALUE: &str = "provisioning";

pub struct PoolManager {
    slots: Arc<dyn SlotRepository>,
    orchestrator: Arc<dyn ContainerOrchestrator>,
    images: ImageConfig,
    max_pool_size: usize,
}

impl PoolManager {
    pub fn new(
        slots: Arc<dyn SlotRepository>,
        orchestrator: Arc<dyn ContainerOrchestrator>,
        images: ImageConfig,
        max_pool_size: usize,
    ) -> Self {
        Self {
            slots,
            orchestrator,
            images,
            max_pool_size,
        }
    }

    /// Assign a slot to `bot_id`: reuse an idle slot when one exists,
    /// grow the pool when below the cap, otherwise return `None` and
    /// let the caller enqueue the bot.
    #[instrument(skip(self), err)]
    pub async fn acquire(
        &self,
        platform: MeetingPlatform,
        bot_id: i64,
    ) -> ControlPlaneResult<Option<PoolSlot>> {
        if let Some(slot) = self.slots.acquire_idle(platform, bot_id, Utc::now()).await? {
            info!(bot_id, slot = %slot.slot_name, "reusing idle slot");
            self.describe_busy(&slot, bot_id).await;
            return Ok(Some(slot));
        }

        // No idle slot: grow if the cap allows. The slot name carries
        // the ordinal; a unique-name collision means another acquirer
        // grew the pool concurrently, so recount and try again. Each
        // collision implies someone else inserted, so the cap also
        // bounds the retries.
        for _ in 0..self.max_pool_size.max(1) {
            let count = self.slots.count(platform).await?;
            if count as usize >= self.max_pool_size {
                info!(bot_id, %platform, count, "pool saturated");
                return Ok(None);
            }

            let slot_name = PoolSlot::derive_name(platform, count as usize + 1);
            let image = self.images.for_platform(platform);
            let placeholder = placeholder_env();

            let service_id = self
                .orchestrator
                .create(image, &placeholder, Some(&slot_name))
                .await
                .map_err(|e| ControlPlaneError::Orchestrator(e.to_string()))?;

            match self
                .slots
                .insert(&slot_name, &service_id, platform, bot_id, Utc::now())
                .await
            {
                Ok(slot) => {
                    info!(bot_id, slot = %slot.slot_name, %service_id, "created pool slot");
                    return Ok(Some(slot));
                }
                Err(err) if is_unique_violation(&err) => {
                    warn!(%slot_name, "slot name taken by concurrent growth, retrying");
                    if let Err(del) = self.orchestrator.delete(&service_id).await {
                        warn!(%service_id, error = %del, "orphan service cleanup failed");
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(ControlPlaneError::Database(
            "pool growth kept colliding on slot names".to_string(),
        ))
    }

    /// Inject the per-bot environment into the slot's container and
    /// start it.
    #[instrument(skip(self, env), err)]
    pub async fn configure_and_start(
        &self,
        slot: &PoolSlot,
        bot_id: i64,
        env: &HashMap<String, String>,
    ) -> ControlPlaneResult<()> {
        self.orchestrator
            .update_env(&slot.service_id, env)
            .await
            .map_err(|e| ControlPlaneError::Orchestrator(e.to_string()))?;
        self.orchestrator
            .start(&slot.service_id)
            .await
            .map_err(|e| ControlPlaneError::Orchestrator(e.to_string()))?;

        self.slots.mark_busy(slot.id, bot_id, Utc::now()).await?;
        self.describe_busy(slot, bot_id).await;
        Ok(())
    }

    /// Return the bot's slot to the pool. Stop failure parks the slot
    /// in `error` for the recovery worker.
    #[instrument(skip(self), err)]
    pub async fn release(&self, bot_id: i64) -> ControlPlaneResult<()> {
        let Some(slot) = self.slots.find_by_bot(bot_id).await? else {
            warn!(bot_id, "release for a bot with no slot; ignoring");
            return Ok(());
        };

        match self.orchestrator.stop(&slot.service_id).await {
            Ok(()) => {
                self.slots.release(slot.id, Utc::now()).await?;
                info!(bot_id, slot = %slot.slot_name, "slot released");
                self.describe(
                    &slot,
                    &format!("[IDLE] Available - Last used: {}", Utc::now().to_rfc3339()),
                )
                .await;
            }
            Err(err) => {
                let message = err.to_string();
                self.slots.mark_error(slot.id, &message).await?;
                warn!(bot_id, slot = %slot.slot_name, error = %message, "stop failed, slot marked error");
                self.describe(
                    &slot,
                    &format!("[ERROR] {} - {}", message, Utc::now().to_rfc3339()),
                )
                .await;
            }
        }
        Ok(())
    }

    pub async fn find_slot_for_bot(&self, bot_id: i64) -> ControlPlaneResult<Option<PoolSlot>> {
        self.slots.find_by_bot(bot_id).await
    }

    pub async fn list(&self) -> ControlPlaneResult<Vec<PoolSlot>> {
        self.slots.list().await
    }

    pub async fn mark_slot_error(&self, slot_id: i64, message: &str) -> ControlPlaneResult<()> {
        self.slots.mark_error(slot_id, message).await
    }

    pub async fn set_slot_status(
        &self,
        slot_id: i64,
        status: SlotStatus,
    ) -> ControlPlaneResult<()> {
        self.slots.set_status(slot_id, status).await
    }

    async fn describe_busy(&self, slot: &PoolSlot, bot_id: i64) {
        self.describe(
            slot,
            &format!("[BUSY] Bot #{} - {}", bot_id, Utc::now().to_rfc3339()),
        )
        .await;
    }

    /// Best-effort orchestrator metadata update.
    async fn describe(&self, slot: &PoolSlot, description: &str) {
        if let Err(err) = self
            .orchestrator
            .set_description(&slot.service_id, description)
            .await
        {
            warn!(slot = %slot.slot_name, error = %err, "description update failed");
        }
    }
}

fn placeholder_env() -> HashMap<String, String> {
    HashMap::from([(
        crate::domain::models::RUN_ENV.to_string(),
        PLACEHOLDER_ENV_VALUE.to_string(),
    )])
}

fn is_unique_violation(err: &ControlPlaneError) -> bool {
    matches!(err, ControlPlaneError::Database(msg) if msg.contains("UNIQUE"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{connection::create_test_pool, migrations, SqliteSlotRepository};
    use crate::domain::ports::{OrchestratorError, OrchestratorResult, ServiceStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Orchestrator stub that records calls and can fail `stop`.
    #[derive(Default)]
    struct StubOrchestrator {
        created: Mutex<Vec<String>>,
        stop_fails: AtomicBool,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl ContainerOrchestrator for StubOrchestrator {
        async fn create(
            &self,
            _image: &str,
            _env: &HashMap<String, String>,
            name: Option<&str>,
        ) -> OrchestratorResult<String> {
            let name = name.unwrap_or("anon").to_string();
            self.created.lock().await.push(name.clone());
            Ok(format!("svc-{name}"))
        }

        async fn start(&self, _service_id: &str) -> OrchestratorResult<()> {
            Ok(())
        }

        async fn stop(&self, _service_id: &str) -> OrchestratorResult<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.stop_fails.load(Ordering::SeqCst) {
                Err(OrchestratorError::Transport("stop refused".into()))
            } else {
                Ok(())
            }
        }

        async fn delete(&self, _service_id: &str) -> OrchestratorResult<()> {
            Ok(())
        }

        async fn update_env(
            &self,
            _service_id: &str,
            _env: &HashMap<String, String>,
        ) -> OrchestratorResult<()> {
            Ok(())
        }

        async fn describe(&self, _service_id: &str) -> OrchestratorResult<ServiceStatus> {
            Ok(ServiceStatus::Running)
        }

        async fn set_description(
            &self,
            _service_id: &str,
            _description: &str,
        ) -> OrchestratorResult<()> {
            Ok(())
        }
    }

    async fn setup(max: usize) -> (PoolManager, Arc<StubOrchestrator>, Arc<SqliteSlotRepository>) {
        let pool = create_test_pool().await.unwrap();
        migrations::migrate(&pool).await.unwrap();
        let slots = Arc::new(SqliteSlotRepository::new(pool));
        let orch = Arc::new(StubOrchestrator::default());
        let manager = PoolManager::new(
            slots.clone(),
            orch.clone(),
            ImageConfig::default(),
            max,
        );
        (manager, orch, slots)
    }

    #[tokio::test]
    async fn cold_start_grows_pool_with_ordinal_names() {
        let (manager, orch, _slots) = setup(100).await;

        for bot_id in 1..=3 {
            let slot = manager
                .acquire(MeetingPlatform::Zoom, bot_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(slot.assigned_bot_id, Some(bot_id));
            assert_eq!(slot.status, SlotStatus::Deploying);
        }

        let created = orch.created.lock().await;
        assert_eq!(
            *created,
            vec!["pool-zoom-001", "pool-zoom-002", "pool-zoom-003"]
        );
    }

    #[tokio::test]
    async fn saturated_pool_returns_none() {
        let (manager, _orch, _slots) = setup(2).await;

        assert!(manager.acquire(MeetingPlatform::Meet, 1).await.unwrap().is_some());
        assert!(manager.acquire(MeetingPlatform::Meet, 2).await.unwrap().is_some());
        assert!(manager.acquire(MeetingPlatform::Meet, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn acquire_reuses_released_slot() {
        let (manager, orch, _slots) = setup(5).await;

        let first = manager.acquire(MeetingPlatform::Meet, 1).await.unwrap().unwrap();
        manager.release(1).await.unwrap();

        let second = manager.acquire(MeetingPlatform::Meet, 2).await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.assigned_bot_id, Some(2));
        assert_eq!(second.status, SlotStatus::Busy);
        // Only one container was ever created.
        assert_eq!(orch.created.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn release_without_slot_is_a_warning_not_an_error() {
        let (manager, orch, _slots) = setup(5).await;
        manager.release(77).await.unwrap();
        assert_eq!(orch.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_stop_marks_slot_error() {
        let (manager, orch, slots) = setup(5).await;
        let slot = manager.acquire(MeetingPlatform::Meet, 1).await.unwrap().unwrap();

        orch.stop_fails.store(true, Ordering::SeqCst);
        manager.release(1).await.unwrap();

        let slot = slots.get(slot.id).await.unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Error);
        assert!(slot.error_message.unwrap().contains("stop refused"));
    }

    #[tokio::test]
    async fn platforms_have_independent_pools() {
        let (manager, orch, _slots) = setup(1).await;

        assert!(manager.acquire(MeetingPlatform::Meet, 1).await.unwrap().is_some());
        assert!(manager.acquire(MeetingPlatform::Zoom, 2).await.unwrap().is_some());
        assert!(manager.acquire(MeetingPlatform::Meet, 3).await.unwrap().is_none());

        let created = orch.created.lock().await;
        assert_eq!(*created, vec!["pool-meet-001", "pool-zoom-001"]);
    }
}
