//! Shared helpers for integration tests.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use meetbot::adapters::sqlite;
use meetbot::api::{build_services, Services};
use meetbot::domain::errors::ControlPlaneResult;
use meetbot::domain::models::{
    AutomaticLeave, Config, MeetingInfo, MeetingPlatform, OrchestratorMode, Tenant,
};
use meetbot::domain::ports::{
    ArtifactStore, ContainerOrchestrator, NewBot, OrchestratorError, OrchestratorResult,
    ServiceStatus, TenantRepository,
};

/// Records orchestrator calls; every operation succeeds unless told
/// otherwise.
#[derive(Default)]
pub struct FakeOrchestrator {
    pub created: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<String>>,
    pub stop_fails: AtomicBool,
    pub start_fails: AtomicBool,
}

#[async_trait]
impl ContainerOrchestrator for FakeOrchestrator {
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
        if self.start_fails.load(Ordering::SeqCst) {
            return Err(OrchestratorError::Transport("start refused".into()));
        }
        Ok(())
    }

    async fn stop(&self, service_id: &str) -> OrchestratorResult<()> {
        if self.stop_fails.load(Ordering::SeqCst) {
            return Err(OrchestratorError::Transport("stop refused".into()));
        }
        self.stopped.lock().await.push(service_id.to_string());
        Ok(())
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

    async fn set_description(&self, _id: &str, _d: &str) -> OrchestratorResult<()> {
        Ok(())
    }
}

/// In-memory artifact store.
#[derive(Default)]
pub struct FakeArtifactStore {
    pub objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

#[async_trait]
impl ArtifactStore for FakeArtifactStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ControlPlaneResult<()> {
        self.objects
            .lock()
            .await
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get_signed_url(&self, key: &str, _ttl: Duration) -> ControlPlaneResult<String> {
        Ok(format!("https://artifacts.test/{key}?signed"))
    }
}

pub struct TestHarness {
    pub db: SqlitePool,
    pub services: Arc<Services>,
    pub orchestrator: Arc<FakeOrchestrator>,
    pub artifacts: Arc<FakeArtifactStore>,
    pub tenant: Tenant,
}

/// Build the full service graph over in-memory SQLite with fakes at
/// the orchestrator and artifact seams.
pub async fn harness() -> TestHarness {
    harness_with(|_config| {}).await
}

pub async fn harness_with(tweak: impl FnOnce(&mut Config)) -> TestHarness {
    let db = sqlite::create_test_pool().await.expect("test pool");
    sqlite::migrate(&db).await.expect("migrations");

    let mut config = Config::default();
    config.orchestrator.mode = OrchestratorMode::WarmPool;
    config.server.agent_token = "test-agent-token".to_string();
    tweak(&mut config);

    let orchestrator = Arc::new(FakeOrchestrator::default());
    let artifacts = Arc::new(FakeArtifactStore::default());

    let services = build_services(
        db.clone(),
        Arc::new(config),
        orchestrator.clone(),
        artifacts.clone(),
    );

    let tenant = services
        .tenants
        .insert(
            "acme",
            meetbot::domain::models::SubscriptionPlan::Pro,
            None,
            "UTC",
        )
        .await
        .expect("tenant");

    TestHarness {
        db,
        services,
        orchestrator,
        artifacts,
        tenant,
    }
}

pub fn new_bot(tenant_id: i64, platform: MeetingPlatform) -> NewBot {
    NewBot {
        tenant_id,
        meeting_info: MeetingInfo {
            platform,
            url: "https://meet.example/abc".into(),
            credentials: None,
        },
        meeting_title: "Sync".into(),
        display_name: "Notetaker".into(),
        scheduled_start: None,
        scheduled_end: None,
        recording_enabled: false,
        chat_enabled: false,
        heartbeat_interval_ms: 10_000,
        automatic_leave: AutomaticLeave::default(),
        callback_url: None,
    }
}

/// Pre-warm `count` idle slots for a platform by acquiring and
/// releasing them.
pub async fn prewarm(harness: &TestHarness, platform: MeetingPlatform, count: usize) {
    for i in 0..count {
        let bot_id = 1_000_000 + i as i64;
        harness
            .services
            .pool_manager
            .acquire(platform, bot_id)
            .await
            .expect("acquire")
            .expect("slot");
        harness
            .services
            .pool_manager
            .release(bot_id)
            .await
            .expect("release");
    }
}

/// Current queue entry count straight from the store.
pub async fn queue_len(harness: &TestHarness) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queue_entries")
        .fetch_one(&harness.db)
        .await
        .unwrap();
    count
}
