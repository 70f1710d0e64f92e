//! Orchestrator adapters: container-service API, local processes, and
//! the shared wait/retry deployment helpers.

pub mod deploy;
pub mod http_api;
pub mod local;

pub use deploy::{deploy_with_retry, wait_for_deployment, WaitOptions};
pub use http_api::ContainerApiClient;
pub use local::LocalProcessOrchestrator;
