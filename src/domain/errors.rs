//! Domain errors for the bot fleet control plane.

use thiserror::Error;

/// Control-plane error taxonomy.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("Bot not found: {0}")]
    BotNotFound(i64),

    #[error("Tenant not found: {0}")]
    TenantNotFound(i64),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Daily bot quota exceeded: {usage}/{limit}")]
    QuotaExceeded { usage: i64, limit: i64 },

    #[error("Unsupported meeting platform: {0}")]
    PlatformUnsupported(String),

    #[error("Orchestrator call failed: {0}")]
    Orchestrator(String),

    #[error("Deployment failed after {attempts} attempts: {last_error}")]
    DeploymentFailed { attempts: u32, last_error: String },

    #[error("Queue timeout: no slot freed before the deadline")]
    QueueTimeout,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Artifact store error: {0}")]
    ArtifactStore(String),
}

pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

impl From<sqlx::Error> for ControlPlaneError {
    fn from(err: sqlx::Error) -> Self {
        ControlPlaneError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ControlPlaneError {
    fn from(err: serde_json::Error) -> Self {
        ControlPlaneError::Serialization(err.to_string())
    }
}

impl ControlPlaneError {
    /// Whether the error is the caller's fault (4xx at the RPC edge).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BotNotFound(_)
                | Self::TenantNotFound(_)
                | Self::Unauthorized(_)
                | Self::QuotaExceeded { .. }
                | Self::PlatformUnsupported(_)
                | Self::ValidationFailed(_)
                | Self::InvalidStatusTransition { .. }
        )
    }
}
