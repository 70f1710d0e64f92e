//! Deployment waits and retries shared by every orchestrator backend.
//!
//! Retry lives here, at the caller side of the port: the primitive
//! create/start/stop operations never retry on their own.

use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::ports::{
    ContainerOrchestrator, DeploymentWait, OrchestratorError, OrchestratorResult, ServiceStatus,
};

/// Knobs for [`wait_for_deployment`].
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// How long `exited`/`stopped` is tolerated before it counts as
    /// failure. Image pull and extract can take 5-25 minutes, during
    /// which some backends briefly report the service as stopped.
    pub halted_grace: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1_800),
            poll_interval: Duration::from_secs(10),
            halted_grace: Duration::from_secs(1_200),
        }
    }
}

/// Poll `describe` until the service is serving, has failed, or the
/// timeout elapses.
pub async fn wait_for_deployment(
    orchestrator: &dyn ContainerOrchestrator,
    service_id: &str,
    options: WaitOptions,
) -> OrchestratorResult<DeploymentWait> {
    let started = tokio::time::Instant::now();

    loop {
        let status = orchestrator.describe(service_id).await?;

        if status.is_serving() {
            return Ok(DeploymentWait {
                success: true,
                status,
                error: None,
            });
        }

        if status.is_failed() {
            return Ok(DeploymentWait {
                success: false,
                status,
                error: Some(format!("service {service_id} entered {status}")),
            });
        }

        if status.is_halted() && started.elapsed() >= options.halted_grace {
            return Ok(DeploymentWait {
                success: false,
                status,
                error: Some(format!(
                    "service {service_id} stayed {status} past the grace window"
                )),
            });
        }

        if started.elapsed() >= options.timeout {
            return Ok(DeploymentWait {
                success: false,
                status,
                error: Some(format!(
                    "deployment wait for {service_id} timed out in {status}"
                )),
            });
        }

        tokio::time::sleep(options.poll_interval).await;
    }
}

/// Create a service and start it, retrying start on the same service id
/// with exponential backoff capped at 30 s. On final failure the
/// service is deleted and the last error surfaced.
pub async fn deploy_with_retry(
    orchestrator: &dyn ContainerOrchestrator,
    image: &str,
    env: &HashMap<String, String>,
    name: Option<&str>,
    max_retries: u32,
) -> OrchestratorResult<String> {
    const BACKOFF_CAP: Duration = Duration::from_secs(30);

    let service_id = orchestrator.create(image, env, name).await?;
    let mut last_error: Option<OrchestratorError> = None;

    for attempt in 0..max_retries {
        if attempt > 0 {
            let backoff = Duration::from_secs(1 << attempt).min(BACKOFF_CAP);
            warn!(
                service_id = %service_id,
                attempt,
                backoff_secs = backoff.as_secs(),
                "retrying service start"
            );
            tokio::time::sleep(backoff).await;
        }

        match orchestrator.start(&service_id).await {
            Ok(()) => {
                info!(service_id = %service_id, attempt, "service started");
                return Ok(service_id);
            }
            Err(err) => last_error = Some(err),
        }
    }

    // Exhausted: clean up the half-created service before surfacing.
    if let Err(err) = orchestrator.delete(&service_id).await {
        warn!(service_id = %service_id, error = %err, "cleanup delete failed");
    }

    Err(last_error.unwrap_or_else(|| {
        OrchestratorError::Transport("deploy_with_retry with zero attempts".to_string())
    }))
}
