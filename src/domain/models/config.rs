//! Control-plane configuration model.
//!
//! Loaded by `infrastructure::config::ConfigLoader` with hierarchical
//! merging: programmatic defaults, then YAML files, then `MEETBOT_*`
//! environment variables.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pool: PoolConfig,
    pub queue: QueueConfig,
    pub recovery: RecoveryConfig,
    pub orchestrator: OrchestratorConfig,
    pub artifacts: ArtifactConfig,
    pub agent: AgentDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".meetbot/meetbot.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Shared secret presented by agents on their own endpoints.
    pub agent_token: String,
    /// Base URL agents use to reach this control plane.
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            agent_token: String::new(),
            public_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: crate::domain::models::slot::MAX_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub default_timeout_ms: u64,
    pub drain_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: crate::domain::models::queue::DEFAULT_QUEUE_TIMEOUT_MS,
            drain_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub interval_secs: u64,
    /// A `deploying` slot untouched for this long is considered stuck.
    pub stale_deploying_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            stale_deploying_secs: 300,
        }
    }
}

/// Which orchestrator backend the deployment coordinator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorMode {
    /// Long-lived warm-pool services, env rewritten per tenancy
    WarmPool,
    /// One service per bot, deleted at end
    Ephemeral,
    /// Spawn a local agent process (development)
    LocalProcess,
}

impl Default for OrchestratorMode {
    fn default() -> Self {
        Self::WarmPool
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub mode: OrchestratorMode,
    /// Container-service API endpoint.
    pub api_url: String,
    pub api_token: String,
    /// Agent image per meeting platform; keys are `meet|teams|zoom`.
    pub images: ImageConfig,
    pub deploy_timeout_secs: u64,
    pub deploy_poll_secs: u64,
    /// Grace window before `exited`/`stopped` counts as failure; image
    /// pulls can take 5-25 minutes.
    pub exited_grace_secs: u64,
    pub max_deploy_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: OrchestratorMode::WarmPool,
            api_url: "http://localhost:9090".to_string(),
            api_token: String::new(),
            images: ImageConfig::default(),
            deploy_timeout_secs: 1_800,
            deploy_poll_secs: 10,
            exited_grace_secs: 1_200,
            max_deploy_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub meet: String,
    pub teams: String,
    pub zoom: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            meet: "meetbot/agent-meet:latest".to_string(),
            teams: "meetbot/agent-teams:latest".to_string(),
            zoom: "meetbot/agent-zoom:latest".to_string(),
        }
    }
}

impl ImageConfig {
    pub fn for_platform(&self, platform: crate::domain::models::bot::MeetingPlatform) -> &str {
        use crate::domain::models::bot::MeetingPlatform;
        match platform {
            MeetingPlatform::Meet => &self.meet,
            MeetingPlatform::Teams => &self.teams,
            MeetingPlatform::Zoom => &self.zoom,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub bucket: String,
    pub region: String,
    /// Optional custom endpoint (minio, localstack).
    pub endpoint: Option<String>,
    pub signed_url_ttl_secs: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            bucket: "meetbot-artifacts".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            signed_url_ttl_secs: 3_600,
        }
    }
}

/// Defaults applied to bots that omit the corresponding request fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    pub heartbeat_interval_ms: u64,
    pub max_duration_secs: u64,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 10_000,
            max_duration_secs: 3_600,
        }
    }
}
