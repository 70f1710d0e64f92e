//! Heartbeat loop.
//!
//! Pings the control plane on the configured interval and applies any
//! operator intent the response carries. Unreachable control plane is
//! logged and survived; the bot never dies over a missed beat.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::agent::control_client::ControlPlaneClient;
use crate::agent::retry::RetryPolicy;
use crate::infrastructure::logging::LogHandle;

pub struct HeartbeatLoop {
    client: ControlPlaneClient,
    interval_ms: u64,
    retry: RetryPolicy,
    leave_tx: watch::Sender<bool>,
    log_handle: Option<LogHandle>,
}

impl HeartbeatLoop {
    pub fn new(
        client: ControlPlaneClient,
        interval_ms: u64,
        leave_tx: watch::Sender<bool>,
        log_handle: Option<LogHandle>,
    ) -> Self {
        Self {
            client,
            interval_ms,
            retry: RetryPolicy::default(),
            leave_tx,
            log_handle,
        }
    }

    /// Beat until a leave is requested (locally or by the operator) or
    /// the shutdown signal fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_millis(self.interval_ms.max(1_000)));
        let mut leave_rx = self.leave_tx.subscribe();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    debug!("heartbeat loop shutting down");
                    return;
                }
                _ = leave_rx.changed() => {
                    debug!("leave requested locally, heartbeat loop stopping");
                    return;
                }
            }

            let reply = self.retry.execute(|| self.client.heartbeat()).await;
            match reply {
                Ok(reply) => {
                    if let Some(level) = reply.log_level.as_deref() {
                        info!(level, "operator changed log level");
                        if let Some(handle) = &self.log_handle {
                            if let Err(err) = handle.set_level(level) {
                                warn!(level, error = %err, "log level change rejected");
                            }
                        }
                    }

                    if reply.should_leave == Some(true) {
                        info!("operator requested leave");
                        let _ = self.leave_tx.send(true);
                        return;
                    }
                }
                Err(err) => {
                    // Exhausted retries: log and keep beating.
                    warn!(error = %err, "heartbeat unreachable, continuing");
                }
            }
        }
    }
}
