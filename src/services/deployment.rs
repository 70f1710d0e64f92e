//! Deployment coordinator.
//!
//! Single entry point for "deploy bot N now": picks local vs pool,
//! drives pool acquisition or enqueue, and records the outcome on the
//! bot row.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::adapters::orchestrator::{deploy_with_retry, wait_for_deployment, WaitOptions};
use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{
    Bot, BotConfig, BotStatus, Config, OrchestratorMode, PoolSlot, ARTIFACT_BUCKET_ENV,
    BOT_AUTH_TOKEN_ENV, BOT_DATA_ENV, CONTROL_PLANE_URL_ENV, DEFAULT_PRIORITY, RUN_ENV,
};
use crate::domain::ports::{BotRepository, ContainerOrchestrator};
use crate::services::pool_manager::PoolManager;
use crate::services::queue_manager::QueueManager;

/// Deployment target recorded on bots placed on the warm pool.
const POOL_DEPLOYMENT: &str = "warm-pool";
/// Deployment target recorded on locally spawned bots.
const LOCAL_DEPLOYMENT: &str = "local-process";

/// What `deploy` tells the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutcome {
    pub bot: Bot,
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_ms: Option<u64>,
}

pub struct DeploymentCoordinator {
    bots: Arc<dyn BotRepository>,
    pool: Arc<PoolManager>,
    queue: Arc<QueueManager>,
    orchestrator: Arc<dyn ContainerOrchestrator>,
    config: Arc<Config>,
}

impl DeploymentCoordinator {
    pub fn new(
        bots: Arc<dyn BotRepository>,
        pool: Arc<PoolManager>,
        queue: Arc<QueueManager>,
        orchestrator: Arc<dyn ContainerOrchestrator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            bots,
            pool,
            queue,
            orchestrator,
            config,
        }
    }

    /// Deploy a bot now: onto a pool slot when one is free, into the
    /// queue when the pool is saturated. Any orchestrator or queue
    /// failure lands on the bot row as FATAL + deployment-error before
    /// being re-raised.
    #[instrument(skip(self), err)]
    pub async fn deploy(
        &self,
        bot_id: i64,
        queue_timeout_ms: Option<u64>,
    ) -> ControlPlaneResult<DeployOutcome> {
        let bot = self
            .bots
            .get(bot_id)
            .await?
            .ok_or(ControlPlaneError::BotNotFound(bot_id))?;

        match self.try_deploy(&bot, queue_timeout_ms).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(bot_id, error = %err, "deployment failed");
                self.bots
                    .set_deployment_error(bot_id, &err.to_string())
                    .await?;
                self.bots.transition_status(bot_id, BotStatus::Fatal).await?;
                Err(err)
            }
        }
    }

    async fn try_deploy(
        &self,
        bot: &Bot,
        queue_timeout_ms: Option<u64>,
    ) -> ControlPlaneResult<DeployOutcome> {
        let env = self.build_agent_env(bot)?;

        if self.config.orchestrator.mode == OrchestratorMode::LocalProcess {
            return self.deploy_local(bot, &env).await;
        }

        match self.pool.acquire(bot.meeting_info.platform, bot.id).await? {
            Some(slot) => self.deploy_on_slot(bot, slot, &env).await,
            None => {
                let timeout =
                    queue_timeout_ms.unwrap_or(self.config.queue.default_timeout_ms);
                let (_entry, position, estimate) = self
                    .queue
                    .enqueue(bot.id, DEFAULT_PRIORITY, timeout)
                    .await?;

                let bot = self.reload(bot.id).await?;
                Ok(DeployOutcome {
                    bot,
                    queued: true,
                    queue_position: Some(position),
                    estimated_wait_ms: Some(estimate),
                })
            }
        }
    }

    async fn deploy_on_slot(
        &self,
        bot: &Bot,
        slot: PoolSlot,
        env: &HashMap<String, String>,
    ) -> ControlPlaneResult<DeployOutcome> {
        // A failed start must not strand the slot: acquisition already
        // marked it busy, and a bot that never ran emits no terminal
        // event to release it. Hand it to the recovery worker instead.
        if let Err(err) = self.start_on_slot(bot, &slot, env).await {
            if let Err(mark_err) = self.pool.mark_slot_error(slot.id, &err.to_string()).await {
                warn!(slot = %slot.slot_name, error = %mark_err, "failed to park slot in error");
            }
            return Err(err);
        }

        info!(bot_id = bot.id, slot = %slot.slot_name, "bot deployed on pool slot");
        let bot = self.reload(bot.id).await?;
        Ok(DeployOutcome {
            bot,
            queued: false,
            queue_position: None,
            estimated_wait_ms: None,
        })
    }

    async fn start_on_slot(
        &self,
        bot: &Bot,
        slot: &PoolSlot,
        env: &HashMap<String, String>,
    ) -> ControlPlaneResult<()> {
        self.bots
            .transition_status(bot.id, BotStatus::Deploying)
            .await?;

        self.pool.configure_and_start(slot, bot.id, env).await?;

        self.bots
            .set_deployment(bot.id, POOL_DEPLOYMENT, &slot.slot_name)
            .await?;
        self.bots
            .transition_status(bot.id, BotStatus::JoiningCall)
            .await?;
        Ok(())
    }

    /// One service per bot: create and start with retry, then watch the
    /// deployment in the background and fail the bot if the service
    /// never comes up.
    async fn deploy_local(
        &self,
        bot: &Bot,
        env: &HashMap<String, String>,
    ) -> ControlPlaneResult<DeployOutcome> {
        self.bots
            .transition_status(bot.id, BotStatus::Deploying)
            .await?;

        let name = format!("local-bot-{}", bot.id);
        let image = self
            .config
            .orchestrator
            .images
            .for_platform(bot.meeting_info.platform);
        let service_id = deploy_with_retry(
            self.orchestrator.as_ref(),
            image,
            env,
            Some(&name),
            self.config.orchestrator.max_deploy_retries,
        )
        .await
        .map_err(|e| ControlPlaneError::Orchestrator(e.to_string()))?;

        self.bots
            .set_deployment(bot.id, LOCAL_DEPLOYMENT, &service_id)
            .await?;
        self.bots
            .transition_status(bot.id, BotStatus::JoiningCall)
            .await?;
        self.watch_deployment(bot.id, service_id.clone());

        info!(bot_id = bot.id, %service_id, "bot running as its own service");
        let bot = self.reload(bot.id).await?;
        Ok(DeployOutcome {
            bot,
            queued: false,
            queue_position: None,
            estimated_wait_ms: None,
        })
    }

    /// Bounded background wait on the service's describe-status; a
    /// deployment that never starts serving fails the bot.
    fn watch_deployment(&self, bot_id: i64, service_id: String) {
        let orchestrator = self.orchestrator.clone();
        let bots = self.bots.clone();
        let options = WaitOptions {
            timeout: Duration::from_secs(self.config.orchestrator.deploy_timeout_secs),
            poll_interval: Duration::from_secs(self.config.orchestrator.deploy_poll_secs),
            halted_grace: Duration::from_secs(self.config.orchestrator.exited_grace_secs),
        };

        tokio::spawn(async move {
            match wait_for_deployment(orchestrator.as_ref(), &service_id, options).await {
                Ok(wait) if wait.success => {
                    info!(bot_id, %service_id, "deployment became ready");
                }
                Ok(wait) => {
                    let message = wait
                        .error
                        .unwrap_or_else(|| format!("service stuck in {}", wait.status));
                    error!(bot_id, %service_id, %message, "deployment never became ready");
                    let _ = bots.set_deployment_error(bot_id, &message).await;
                    let _ = bots.transition_status(bot_id, BotStatus::Fatal).await;
                }
                Err(err) => {
                    error!(bot_id, %service_id, error = %err, "deployment watch aborted");
                }
            }
        });
    }

    /// Complete the assignments produced by a queue drain: configure
    /// and start each slot, record the deployment, and move the bot to
    /// JOINING_CALL. A failed assignment fails that bot, not the pass.
    #[instrument(skip(self), err)]
    pub async fn drain_queue(&self) -> ControlPlaneResult<usize> {
        let report = self.queue.drain(&self.pool).await?;
        let mut started = 0;

        for (bot, slot) in report.assignments {
            match self.finish_assignment(&bot, &slot).await {
                Ok(()) => started += 1,
                Err(err) => {
                    error!(bot_id = bot.id, error = %err, "drained assignment failed");
                    self.bots
                        .set_deployment_error(bot.id, &err.to_string())
                        .await?;
                    self.bots
                        .transition_status(bot.id, BotStatus::Fatal)
                        .await?;
                    self.pool.mark_slot_error(slot.id, &err.to_string()).await?;
                }
            }
        }

        Ok(started)
    }

    async fn finish_assignment(&self, bot: &Bot, slot: &PoolSlot) -> ControlPlaneResult<()> {
        let env = self.build_agent_env(bot)?;
        self.bots
            .set_deployment(bot.id, POOL_DEPLOYMENT, &slot.slot_name)
            .await?;
        self.pool.configure_and_start(slot, bot.id, &env).await?;
        self.bots
            .transition_status(bot.id, BotStatus::JoiningCall)
            .await?;
        Ok(())
    }

    /// The env contract the agent reads at startup.
    fn build_agent_env(&self, bot: &Bot) -> ControlPlaneResult<HashMap<String, String>> {
        let payload = BotConfig::from_bot(bot)
            .encode()
            .map_err(|e| ControlPlaneError::Serialization(e.to_string()))?;

        Ok(HashMap::from([
            (BOT_DATA_ENV.to_string(), payload),
            (
                BOT_AUTH_TOKEN_ENV.to_string(),
                self.config.server.agent_token.clone(),
            ),
            (
                CONTROL_PLANE_URL_ENV.to_string(),
                self.config.server.public_url.clone(),
            ),
            (
                ARTIFACT_BUCKET_ENV.to_string(),
                self.config.artifacts.bucket.clone(),
            ),
            (RUN_ENV.to_string(), "production".to_string()),
        ]))
    }

    async fn reload(&self, bot_id: i64) -> ControlPlaneResult<Bot> {
        self.bots
            .get(bot_id)
            .await?
            .ok_or(ControlPlaneError::BotNotFound(bot_id))
    }
}
