//! Domain models for the bot fleet control plane.

pub mod bot;
pub mod bot_config;
pub mod config;
pub mod event;
pub mod queue;
pub mod screenshot;
pub mod slot;
pub mod tenant;

pub use bot::{
    AutomaticLeave, Bot, BotStatus, MeetingCredentials, MeetingInfo, MeetingPlatform,
    SpeakerTimeframe, MIN_LEAVE_TIMEOUT_MS,
};
pub use bot_config::{
    BotConfig, BotConfigError, ARTIFACT_BUCKET_ENV, BOT_AUTH_TOKEN_ENV, BOT_DATA_ENV,
    CONTROL_PLANE_URL_ENV, RUN_ENV,
};
pub use config::{
    AgentDefaults, ArtifactConfig, Config, DatabaseConfig, ImageConfig, LoggingConfig,
    OrchestratorConfig, OrchestratorMode, PoolConfig, QueueConfig, RecoveryConfig, ServerConfig,
};
pub use event::{
    BotEvent, EventData, EventType, SUB_CODE_DURATION_LIMIT, SUB_CODE_QUEUE_TIMEOUT,
};
pub use queue::{
    clamp_queue_timeout_ms, estimated_wait_ms, QueueEntry, DEFAULT_PRIORITY,
    DEFAULT_QUEUE_TIMEOUT_MS, MAX_QUEUE_TIMEOUT_MS,
};
pub use screenshot::{recording_key, screenshot_key, ScreenshotRecord, ScreenshotType};
pub use slot::{PoolSlot, SlotStatus, MAX_POOL_SIZE, MAX_RECOVERY_ATTEMPTS};
pub use tenant::{SubscriptionPlan, Tenant, FREE_DAILY_LIMIT, PRO_DAILY_LIMIT};
