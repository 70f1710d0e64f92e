//! Local-process orchestrator for development mode.
//!
//! Each "service" is a spawned `meetbot-agent` process on this machine.
//! `stop` sends SIGTERM so the agent can flush logs and exit cleanly.

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::ports::{
    ContainerOrchestrator, OrchestratorError, OrchestratorResult, ServiceStatus,
};

struct LocalService {
    env: HashMap<String, String>,
    child: Option<Child>,
}

/// Spawns agent processes instead of containers.
pub struct LocalProcessOrchestrator {
    agent_binary: String,
    services: Arc<Mutex<HashMap<String, LocalService>>>,
}

impl LocalProcessOrchestrator {
    pub fn new(agent_binary: impl Into<String>) -> Self {
        Self {
            agent_binary: agent_binary.into(),
            services: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for LocalProcessOrchestrator {
    fn default() -> Self {
        Self::new("meetbot-agent")
    }
}

#[async_trait]
impl ContainerOrchestrator for LocalProcessOrchestrator {
    async fn create(
        &self,
        _image: &str,
        env: &HashMap<String, String>,
        name: Option<&str>,
    ) -> OrchestratorResult<String> {
        let service_id = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("local-{}", Uuid::new_v4()));

        let mut services = self.services.lock().await;
        services.insert(
            service_id.clone(),
            LocalService {
                env: env.clone(),
                child: None,
            },
        );
        debug!(service_id = %service_id, "registered local service");
        Ok(service_id)
    }

    async fn start(&self, service_id: &str) -> OrchestratorResult<()> {
        let mut services = self.services.lock().await;
        let service = services
            .get_mut(service_id)
            .ok_or_else(|| OrchestratorError::ServiceNotFound(service_id.to_string()))?;

        if let Some(child) = &mut service.child {
            if child.try_wait().map_err(io_err)?.is_none() {
                // Already running.
                return Ok(());
            }
        }

        let child = Command::new(&self.agent_binary)
            .envs(&service.env)
            .kill_on_drop(false)
            .spawn()
            .map_err(io_err)?;

        debug!(service_id = %service_id, pid = child.id(), "spawned agent process");
        service.child = Some(child);
        Ok(())
    }

    async fn stop(&self, service_id: &str) -> OrchestratorResult<()> {
        let mut services = self.services.lock().await;
        let service = services
            .get_mut(service_id)
            .ok_or_else(|| OrchestratorError::ServiceNotFound(service_id.to_string()))?;

        let Some(child) = &mut service.child else {
            return Ok(());
        };

        if let Some(pid) = child.id() {
            if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(service_id = %service_id, pid, error = %err, "SIGTERM failed");
            }
        }

        // Reap so the child does not linger as a zombie.
        let _ = child.wait().await;
        service.child = None;
        Ok(())
    }

    async fn delete(&self, service_id: &str) -> OrchestratorResult<()> {
        self.stop(service_id).await.ok();
        self.services.lock().await.remove(service_id);
        Ok(())
    }

    async fn update_env(
        &self,
        service_id: &str,
        env: &HashMap<String, String>,
    ) -> OrchestratorResult<()> {
        let mut services = self.services.lock().await;
        let service = services
            .get_mut(service_id)
            .ok_or_else(|| OrchestratorError::ServiceNotFound(service_id.to_string()))?;
        service.env = env.clone();
        Ok(())
    }

    async fn describe(&self, service_id: &str) -> OrchestratorResult<ServiceStatus> {
        let mut services = self.services.lock().await;
        let service = services
            .get_mut(service_id)
            .ok_or_else(|| OrchestratorError::ServiceNotFound(service_id.to_string()))?;

        match &mut service.child {
            None => Ok(ServiceStatus::Stopped),
            Some(child) => match child.try_wait().map_err(io_err)? {
                None => Ok(ServiceStatus::Running),
                Some(status) if status.success() => Ok(ServiceStatus::Exited),
                Some(_) => Ok(ServiceStatus::Error),
            },
        }
    }

    async fn set_description(
        &self,
        _service_id: &str,
        _description: &str,
    ) -> OrchestratorResult<()> {
        // Local processes have nowhere to show a description.
        Ok(())
    }
}

fn io_err(err: std::io::Error) -> OrchestratorError {
    OrchestratorError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_registers_and_describe_reports_stopped() {
        let orch = LocalProcessOrchestrator::new("/bin/true");
        let id = orch.create("img", &HashMap::new(), None).await.unwrap();
        assert_eq!(orch.describe(&id).await.unwrap(), ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn unknown_service_is_not_found() {
        let orch = LocalProcessOrchestrator::new("/bin/true");
        let err = orch.start("nope").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ServiceNotFound(_)));
    }

    #[tokio::test]
    async fn start_and_reap_short_lived_process() {
        let orch = LocalProcessOrchestrator::new("/bin/true");
        let id = orch.create("img", &HashMap::new(), None).await.unwrap();
        orch.start(&id).await.unwrap();

        // /bin/true exits immediately; stop reaps it.
        orch.stop(&id).await.unwrap();
        assert_eq!(orch.describe(&id).await.unwrap(), ServiceStatus::Stopped);

        orch.delete(&id).await.unwrap();
        assert!(matches!(
            orch.describe(&id).await.unwrap_err(),
            OrchestratorError::ServiceNotFound(_)
        ));
    }
}
