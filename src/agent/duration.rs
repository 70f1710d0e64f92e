//! Duration monitor.
//!
//! Checks elapsed attendance once a minute against the hard maximum;
//! on breach emits FATAL with the duration sub-code and requests leave.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant};
use tracing::{debug, error};

use crate::agent::emitter::EventEmitter;
use crate::domain::models::{EventData, EventType, SUB_CODE_DURATION_LIMIT};

/// How often elapsed time is compared with the ceiling.
const CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct DurationMonitor {
    emitter: Arc<EventEmitter>,
    max_duration: Duration,
    leave_tx: watch::Sender<bool>,
}

impl DurationMonitor {
    pub fn new(
        emitter: Arc<EventEmitter>,
        max_duration: Duration,
        leave_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            emitter,
            max_duration,
            leave_tx,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let started = Instant::now();
        let mut ticker = interval(CHECK_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    debug!("duration monitor shutting down");
                    return;
                }
            }

            if started.elapsed() >= self.max_duration {
                error!(
                    limit_secs = self.max_duration.as_secs(),
                    "maximum attendance duration reached"
                );
                self.emitter
                    .emit(
                        EventType::Fatal,
                        EventData {
                            description: Some(format!(
                                "duration limit of {}s exceeded",
                                self.max_duration.as_secs()
                            )),
                            sub_code: Some(SUB_CODE_DURATION_LIMIT.to_string()),
                        },
                    )
                    .await;
                let _ = self.leave_tx.send(true);
                return;
            }
        }
    }
}
