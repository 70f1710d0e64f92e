//! Service bundle and wiring.
//!
//! Singletons are composed once at boot in dependency order; tests
//! substitute alternative adapters by building the bundle themselves.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::adapters::sqlite::{
    SqliteApiKeyRepository, SqliteBotRepository, SqliteChatRepository, SqliteEventRepository,
    SqliteQueueRepository, SqliteScreenshotRepository, SqliteSlotRepository,
    SqliteTenantRepository, SqliteUsageRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{
    ApiKeyRepository, ArtifactStore, BotRepository, ChatRepository, ContainerOrchestrator,
    TenantRepository,
};
use crate::services::{
    BotService, DeploymentCoordinator, EventLog, PoolManager, QueueManager, QuotaGate,
    SlotRecoveryWorker,
};

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

pub struct Services {
    pub config: Arc<Config>,
    pub bots: Arc<dyn BotRepository>,
    pub tenants: Arc<dyn TenantRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub event_log: Arc<EventLog>,
    pub pool_manager: Arc<PoolManager>,
    pub queue_manager: Arc<QueueManager>,
    pub coordinator: Arc<DeploymentCoordinator>,
    pub quota: Arc<QuotaGate>,
    pub bot_service: Arc<BotService>,
    pub recovery_worker: Arc<SlotRecoveryWorker>,
}

/// Compose the service graph over a database pool, an orchestrator and
/// an artifact store.
pub fn build_services(
    db: SqlitePool,
    config: Arc<Config>,
    orchestrator: Arc<dyn ContainerOrchestrator>,
    artifacts: Arc<dyn ArtifactStore>,
) -> Arc<Services> {
    let bots: Arc<dyn BotRepository> = Arc::new(SqliteBotRepository::new(db.clone()));
    let tenants: Arc<dyn TenantRepository> = Arc::new(SqliteTenantRepository::new(db.clone()));
    let api_keys: Arc<dyn ApiKeyRepository> = Arc::new(SqliteApiKeyRepository::new(db.clone()));
    let chat: Arc<dyn ChatRepository> = Arc::new(SqliteChatRepository::new(db.clone()));
    let slots = Arc::new(SqliteSlotRepository::new(db.clone()));
    let queue = Arc::new(SqliteQueueRepository::new(db.clone()));
    let events = Arc::new(SqliteEventRepository::new(db.clone()));
    let usage = Arc::new(SqliteUsageRepository::new(db.clone()));
    let screenshots = Arc::new(SqliteScreenshotRepository::new(db));

    let event_log = Arc::new(EventLog::new(bots.clone(), events));
    let pool_manager = Arc::new(PoolManager::new(
        slots.clone(),
        orchestrator.clone(),
        config.orchestrator.images.clone(),
        config.pool.max_size,
    ));
    let queue_manager = Arc::new(QueueManager::new(queue, event_log.clone(), bots.clone()));
    let coordinator = Arc::new(DeploymentCoordinator::new(
        bots.clone(),
        pool_manager.clone(),
        queue_manager.clone(),
        orchestrator.clone(),
        config.clone(),
    ));
    let quota = Arc::new(QuotaGate::new(usage));
    let recovery_worker = Arc::new(SlotRecoveryWorker::new(
        slots,
        orchestrator,
        config.recovery.clone(),
    ));

    let bot_service = Arc::new(BotService::new(
        bots.clone(),
        chat.clone(),
        screenshots,
        artifacts,
        quota.clone(),
        coordinator.clone(),
        pool_manager.clone(),
        queue_manager.clone(),
    ));

    Arc::new(Services {
        config,
        bots,
        tenants,
        api_keys,
        chat,
        event_log,
        pool_manager,
        queue_manager,
        coordinator,
        quota,
        bot_service,
        recovery_worker,
    })
}
