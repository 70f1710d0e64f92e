//! Control-plane services.

pub mod bot_service;
pub mod deployment;
pub mod event_log;
pub mod pool_manager;
pub mod queue_manager;
pub mod quota;
pub mod recovery_worker;

pub use bot_service::BotService;
pub use deployment::{DeployOutcome, DeploymentCoordinator};
pub use event_log::EventLog;
pub use pool_manager::PoolManager;
pub use queue_manager::{DrainReport, QueueManager, QUEUE_TIMEOUT_MESSAGE};
pub use quota::{QuotaDecision, QuotaGate};
pub use recovery_worker::{RecoveryHandle, RecoveryReport, SlotRecoveryWorker};
