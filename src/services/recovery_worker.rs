//! Slot recovery background worker.
//!
//! Periodic sweep over slots in `error` or stuck in `deploying`:
//! recover them with a stop, or delete them once the retry budget is
//! spent.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, instrument, warn};

use crate::domain::errors::ControlPlaneResult;
use crate::domain::models::{RecoveryConfig, MAX_RECOVERY_ATTEMPTS};
use crate::domain::ports::{ContainerOrchestrator, SlotRepository};

/// Outcome of one recovery tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub recovered: usize,
    pub failed: usize,
    pub deleted: usize,
}

pub struct SlotRecoveryWorker {
    slots: Arc<dyn SlotRepository>,
    orchestrator: Arc<dyn ContainerOrchestrator>,
    config: RecoveryConfig,
}

/// Handle to stop a running recovery loop.
pub struct RecoveryHandle {
    stop_flag: Arc<AtomicBool>,
}

impl RecoveryHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }
}

impl SlotRecoveryWorker {
    pub fn new(
        slots: Arc<dyn SlotRepository>,
        orchestrator: Arc<dyn ContainerOrchestrator>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            slots,
            orchestrator,
            config,
        }
    }

    /// One sweep over recoverable slots.
    #[instrument(skip(self), err)]
    pub async fn tick(&self) -> ControlPlaneResult<RecoveryReport> {
        let stale_before =
            Utc::now() - ChronoDuration::seconds(self.config.stale_deploying_secs as i64);
        let candidates = self.slots.find_recoverable(stale_before).await?;
        let mut report = RecoveryReport::default();

        for slot in candidates {
            if slot.recovery_attempts >= MAX_RECOVERY_ATTEMPTS {
                // Retry budget exhausted: remove the slot permanently.
                // A failing backend delete must not keep the row alive.
                if let Err(err) = self.orchestrator.delete(&slot.service_id).await {
                    warn!(slot = %slot.slot_name, error = %err, "backend delete failed, dropping row anyway");
                }
                self.slots.delete(slot.id).await?;
                warn!(slot = %slot.slot_name, "slot deleted after exhausting recovery attempts");
                report.deleted += 1;
                continue;
            }

            match self.orchestrator.stop(&slot.service_id).await {
                Ok(()) => {
                    self.slots.release(slot.id, Utc::now()).await?;
                    info!(slot = %slot.slot_name, "slot recovered to idle");
                    report.recovered += 1;
                }
                Err(err) => {
                    self.slots.increment_recovery_attempts(slot.id).await?;
                    warn!(
                        slot = %slot.slot_name,
                        attempts = slot.recovery_attempts + 1,
                        error = %err,
                        "slot recovery attempt failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            recovered = report.recovered,
            failed = report.failed,
            deleted = report.deleted,
            "slot recovery sweep complete"
        );
        Ok(report)
    }

    /// Run ticks forever on the configured interval until the returned
    /// handle is stopped.
    pub fn spawn(self: Arc<Self>) -> RecoveryHandle {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    info!("slot recovery worker stopping");
                    break;
                }
                if let Err(err) = self.tick().await {
                    warn!(error = %err, "slot recovery sweep errored");
                }
            }
        });

        RecoveryHandle { stop_flag }
    }
}
