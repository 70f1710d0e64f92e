//! Chat queue drain loop.
//!
//! Polls the control plane for queued chat messages and hands them to
//! the platform provider with a randomized delay, so a burst of queued
//! messages does not read as machine-gun chat.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, sleep};
use tracing::{debug, warn};

use crate::agent::control_client::ControlPlaneClient;
use crate::domain::ports::MeetingProvider;

/// Poll cadence for the control-plane chat queue.
const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Dispatch delay band, milliseconds.
const DISPATCH_DELAY_MS: std::ops::RangeInclusive<u64> = 1_000..=6_000;

pub struct ChatDrainLoop {
    client: ControlPlaneClient,
    provider: Arc<dyn MeetingProvider>,
}

impl ChatDrainLoop {
    pub fn new(client: ControlPlaneClient, provider: Arc<dyn MeetingProvider>) -> Self {
        Self { client, provider }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    debug!("chat drain loop shutting down");
                    return;
                }
            }

            let message = match self.client.dequeue_message().await {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, "chat dequeue failed");
                    continue;
                }
            };

            let delay = rand::thread_rng().gen_range(DISPATCH_DELAY_MS);
            sleep(Duration::from_millis(delay)).await;

            match self.provider.send_chat_message(&message).await {
                Ok(()) => debug!(chars = message.len(), "chat message delivered"),
                Err(err) => warn!(error = %err, "chat message delivery failed"),
            }
        }
    }
}
