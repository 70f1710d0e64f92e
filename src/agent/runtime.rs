//! Agent runtime: wiring and the attendance lifecycle.
//!
//! One cooperative process per bot. The main flow joins and attends the
//! meeting; heartbeat, duration and chat loops run alongside and only
//! talk to it through the event emitter and the leave signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::agent::chat::ChatDrainLoop;
use crate::agent::control_client::ControlPlaneClient;
use crate::agent::duration::DurationMonitor;
use crate::agent::emitter::{AgentEvent, EventEmitter, EventSubscriber, RpcReporter};
use crate::agent::heartbeat::HeartbeatLoop;
use crate::domain::models::{
    recording_key, BotConfig, BotStatus, EventData, EventType, ScreenshotType,
};
use crate::domain::ports::{ArtifactStore, MeetingProvider};
use crate::infrastructure::logging::LogHandle;

/// Default hard ceiling on attendance time.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(3_600);

/// Subscriber that captures a screenshot on every state transition.
/// Capture and upload run on a detached task; event delivery never
/// waits for them.
struct ScreenshotOnTransition {
    provider: Arc<dyn MeetingProvider>,
    client: ControlPlaneClient,
}

#[async_trait::async_trait]
impl EventSubscriber for ScreenshotOnTransition {
    fn name(&self) -> &'static str {
        "screenshot-on-transition"
    }

    async fn on_event(&self, event: &AgentEvent) {
        let Some((new_status, _)) = event.transition else {
            return;
        };

        let provider = self.provider.clone();
        let client = self.client.clone();
        let trigger = event.event_type.as_str().to_string();
        let shot_type = match new_status {
            BotStatus::Fatal => ScreenshotType::Fatal,
            _ => ScreenshotType::Status,
        };

        tokio::spawn(async move {
            let png = match provider.screenshot().await {
                Ok(png) => png,
                Err(err) => {
                    warn!(error = %err, "screenshot capture failed");
                    return;
                }
            };
            if let Err(err) = client
                .upload_screenshot(
                    png,
                    shot_type.as_str(),
                    new_status.as_str(),
                    Some(&trigger),
                )
                .await
            {
                warn!(error = %err, "screenshot upload failed");
            }
        });
    }
}

pub struct AgentRuntime {
    config: BotConfig,
    client: ControlPlaneClient,
    emitter: Arc<EventEmitter>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    max_duration: Duration,
    log_handle: Option<LogHandle>,
}

impl AgentRuntime {
    pub fn new(
        config: BotConfig,
        client: ControlPlaneClient,
        artifacts: Option<Arc<dyn ArtifactStore>>,
        log_handle: Option<LogHandle>,
    ) -> Self {
        let emitter = Arc::new(EventEmitter::new(config.id, BotStatus::JoiningCall));
        Self {
            config,
            client,
            emitter,
            artifacts,
            max_duration: DEFAULT_MAX_DURATION,
            log_handle,
        }
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn emitter(&self) -> Arc<EventEmitter> {
        self.emitter.clone()
    }

    /// Attend the meeting to completion. Returns the process exit code:
    /// 0 for a clean DONE, 1 when a FATAL was emitted.
    pub async fn run(self, provider: Arc<dyn MeetingProvider>) -> i32 {
        self.emitter
            .subscribe(Arc::new(RpcReporter::new(self.client.clone())))
            .await;
        self.emitter
            .subscribe(Arc::new(ScreenshotOnTransition {
                provider: provider.clone(),
                client: self.client.clone(),
            }))
            .await;

        let (leave_tx, leave_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let heartbeat = HeartbeatLoop::new(
            self.client.clone(),
            self.config.heartbeat_interval_ms,
            leave_tx.clone(),
            self.log_handle.clone(),
        );
        let heartbeat_task = tokio::spawn(heartbeat.run(shutdown_rx.clone()));

        let monitor =
            DurationMonitor::new(self.emitter.clone(), self.max_duration, leave_tx.clone());
        let monitor_task = tokio::spawn(monitor.run(shutdown_rx.clone()));

        let chat_task = if self.config.chat_enabled {
            let drain = ChatDrainLoop::new(self.client.clone(), provider.clone());
            Some(tokio::spawn(drain.run(shutdown_rx.clone())))
        } else {
            None
        };

        let outcome = self.attend(&provider, leave_rx).await;

        // Stop the side loops, then release browser resources.
        let _ = shutdown_tx.send(true);
        let _ = heartbeat_task.await;
        let _ = monitor_task.await;
        if let Some(task) = chat_task {
            let _ = task.await;
        }
        if let Err(err) = provider.cleanup().await {
            warn!(error = %err, "provider cleanup failed");
        }

        if let Err(err) = outcome {
            error!(error = %err, "attendance failed");
            self.emitter
                .emit(EventType::Fatal, EventData::description(err))
                .await;
        }

        if self.emitter.saw_fatal() {
            1
        } else {
            0
        }
    }

    async fn attend(
        &self,
        provider: &Arc<dyn MeetingProvider>,
        mut leave_rx: watch::Receiver<bool>,
    ) -> Result<(), String> {
        self.emitter
            .emit(EventType::JoiningCall, EventData::default())
            .await;

        provider
            .join()
            .await
            .map_err(|e| format!("join failed: {e}"))?;

        self.emitter.emit(EventType::InCall, EventData::default()).await;
        info!(bot_id = self.config.id, "attending meeting");

        tokio::select! {
            result = provider.run() => {
                result.map_err(|e| format!("attendance aborted: {e}"))?;
                info!(bot_id = self.config.id, "meeting ended");
            }
            _ = leave_rx.wait_for(|leave| *leave) => {
                info!(bot_id = self.config.id, "leave requested, exiting meeting");
                if let Err(err) = provider.request_leave().await {
                    warn!(error = %err, "leave request to platform failed");
                }
            }
        }

        self.emitter
            .emit(EventType::CallEnded, EventData::default())
            .await;

        // Fatal mid-call (duration breach) skips the DONE path.
        if self.emitter.saw_fatal() {
            return Ok(());
        }

        let recording = self.handoff_recording(provider).await;
        let timeframes = provider.get_speaker_timeframes();

        self.emitter.emit(EventType::Done, EventData::default()).await;
        if let Err(err) = self
            .client
            .update_status(
                BotStatus::Done.as_str(),
                recording.as_deref(),
                Some(&timeframes),
            )
            .await
        {
            warn!(error = %err, "final status update failed");
        }

        Ok(())
    }

    /// Upload the finished recording, when one exists, and return its
    /// object key.
    async fn handoff_recording(&self, provider: &Arc<dyn MeetingProvider>) -> Option<String> {
        if !self.config.recording_enabled {
            return None;
        }
        let artifacts = self.artifacts.as_ref()?;
        let path = provider.get_recording_path()?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "recording read failed");
                return None;
            }
        };

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let key = recording_key(self.config.meeting_info.platform, ext);

        match artifacts
            .put_object(&key, bytes, provider.get_content_type())
            .await
        {
            Ok(()) => {
                info!(%key, "recording uploaded");
                Some(key)
            }
            Err(err) => {
                warn!(error = %err, "recording upload failed");
                None
            }
        }
    }
}
