//! In-container agent entry point.
//!
//! Reads its configuration from the environment (`BOT_DATA` et al),
//! selects the platform provider, attends the meeting, and exits with
//! code 0 on a clean DONE or 1 when a FATAL was emitted.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use meetbot::adapters::storage::S3ArtifactStore;
use meetbot::agent::{AgentRuntime, ControlPlaneClient};
use meetbot::domain::models::{
    ArtifactConfig, BotConfig, EventData, EventType, LoggingConfig, ARTIFACT_BUCKET_ENV,
    BOT_AUTH_TOKEN_ENV, CONTROL_PLANE_URL_ENV,
};
use meetbot::domain::ports::ProviderRegistry;
use meetbot::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() {
    let log_handle = init_logging(&LoggingConfig::default()).ok();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "agent cannot start without bot config");
            std::process::exit(1);
        }
    };

    let token = std::env::var(BOT_AUTH_TOKEN_ENV).unwrap_or_default();
    let base_url = match std::env::var(CONTROL_PLANE_URL_ENV) {
        Ok(url) => url,
        Err(_) => {
            error!("agent cannot start without a control-plane URL");
            std::process::exit(1);
        }
    };

    let client = ControlPlaneClient::new(base_url, token, config.id);

    // A panicking task must still leave a FATAL trail before the
    // process dies.
    let crash_client = client.clone();
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let message = panic_info.to_string();
        let client = crash_client.clone();
        let handle = tokio::runtime::Handle::try_current();
        if let Ok(handle) = handle {
            handle.spawn(async move {
                let _ = client
                    .report_event(
                        EventType::Fatal,
                        chrono::Utc::now(),
                        &EventData::description(message),
                    )
                    .await;
            });
        }
        default_hook(panic_info);
    }));

    let artifacts = if std::env::var(ARTIFACT_BUCKET_ENV).is_ok() {
        let artifact_config = ArtifactConfig {
            bucket: std::env::var(ARTIFACT_BUCKET_ENV).unwrap_or_default(),
            ..ArtifactConfig::default()
        };
        Some(Arc::new(S3ArtifactStore::from_config(&artifact_config).await)
            as Arc<dyn meetbot::domain::ports::ArtifactStore>)
    } else {
        None
    };

    let registry = ProviderRegistry::new();
    let Some(provider) = registry.get(config.meeting_info.platform) else {
        // The agent image ships with exactly one platform provider
        // compiled in; reaching this means the image and the bot row
        // disagree.
        error!(platform = %config.meeting_info.platform, "no provider registered for platform");
        let _ = client
            .report_event(
                EventType::Fatal,
                chrono::Utc::now(),
                &EventData::description("no provider registered for platform"),
            )
            .await;
        std::process::exit(1);
    };

    info!(bot_id = config.id, platform = %config.meeting_info.platform, "agent starting");

    let max_duration = scheduled_duration(&config).unwrap_or(meetbot::agent::runtime::DEFAULT_MAX_DURATION);
    let runtime = AgentRuntime::new(config, client, artifacts, log_handle)
        .with_max_duration(max_duration);

    let exit_code = runtime.run(provider).await;
    info!(exit_code, "agent finished");
    std::process::exit(exit_code);
}

/// Scheduled end bounds the hard ceiling when present.
fn scheduled_duration(config: &BotConfig) -> Option<Duration> {
    let end = config.end_time?;
    let remaining = end - chrono::Utc::now();
    remaining.to_std().ok().map(|d| d.max(Duration::from_secs(60)))
}
