//! Container orchestrator port.
//!
//! One capability set across backends: the warm-pool container service,
//! the ephemeral per-bot variant, and a local-process provider for
//! development. Retry is the caller's policy; the primitive operations
//! never retry silently.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Raised by any adapter primitive on transport failure or a non-2xx
/// response from the backing service.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator transport error: {0}")]
    Transport(String),
    #[error("orchestrator rejected request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    #[error("deployment wait timed out after {0:?}")]
    WaitTimeout(Duration),
    #[error("deployment failed: service entered {status} ({message})")]
    DeploymentFailed { status: String, message: String },
    #[error("unsupported operation for this orchestrator: {0}")]
    Unsupported(&'static str),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Normalized describe-status vocabulary. Anything a backend reports
/// outside these tokens maps to `Unknown` and is treated as
/// in-progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Running,
    Healthy,
    Starting,
    Restarting,
    Unhealthy,
    Exited,
    Stopped,
    Error,
    Degraded,
    Unknown,
}

impl ServiceStatus {
    pub fn normalize(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "running" => Self::Running,
            "healthy" => Self::Healthy,
            "starting" => Self::Starting,
            "restarting" => Self::Restarting,
            "unhealthy" => Self::Unhealthy,
            "exited" => Self::Exited,
            "stopped" => Self::Stopped,
            "error" => Self::Error,
            "degraded" => Self::Degraded,
            _ => Self::Unknown,
        }
    }

    /// States that satisfy a deployment wait.
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Running | Self::Healthy)
    }

    /// States that fail a deployment wait immediately.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Error | Self::Degraded)
    }

    /// States that fail a deployment wait only after the grace window.
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Exited | Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Healthy => "healthy",
            Self::Starting => "starting",
            Self::Restarting => "restarting",
            Self::Unhealthy => "unhealthy",
            Self::Exited => "exited",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Degraded => "degraded",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a bounded deployment wait.
#[derive(Debug, Clone)]
pub struct DeploymentWait {
    pub success: bool,
    pub status: ServiceStatus,
    pub error: Option<String>,
}

/// Create/start/stop/delete/describe of a bot container.
#[async_trait]
pub trait ContainerOrchestrator: Send + Sync {
    /// Create the backing service and return its opaque id.
    async fn create(
        &self,
        image: &str,
        env: &HashMap<String, String>,
        name: Option<&str>,
    ) -> OrchestratorResult<String>;

    async fn start(&self, service_id: &str) -> OrchestratorResult<()>;

    async fn stop(&self, service_id: &str) -> OrchestratorResult<()>;

    async fn delete(&self, service_id: &str) -> OrchestratorResult<()>;

    /// Bulk-replace the service's environment.
    async fn update_env(
        &self,
        service_id: &str,
        env: &HashMap<String, String>,
    ) -> OrchestratorResult<()>;

    async fn describe(&self, service_id: &str) -> OrchestratorResult<ServiceStatus>;

    /// Best-effort human-readable description attached to the service;
    /// failures here are logged by callers, never fatal.
    async fn set_description(&self, service_id: &str, description: &str)
        -> OrchestratorResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_normalizes_and_defaults_to_unknown() {
        assert_eq!(ServiceStatus::normalize("RUNNING"), ServiceStatus::Running);
        assert_eq!(ServiceStatus::normalize("degraded"), ServiceStatus::Degraded);
        assert_eq!(ServiceStatus::normalize("suspended"), ServiceStatus::Unknown);
        assert!(!ServiceStatus::Unknown.is_serving());
        assert!(!ServiceStatus::Unknown.is_failed());
    }

    #[test]
    fn wait_classification() {
        assert!(ServiceStatus::Running.is_serving());
        assert!(ServiceStatus::Healthy.is_serving());
        assert!(ServiceStatus::Error.is_failed());
        assert!(ServiceStatus::Degraded.is_failed());
        assert!(ServiceStatus::Exited.is_halted());
        assert!(ServiceStatus::Stopped.is_halted());
        assert!(!ServiceStatus::Starting.is_serving());
    }
}
