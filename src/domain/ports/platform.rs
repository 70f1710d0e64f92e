//! Meeting platform provider port.
//!
//! Providers are named variants over one capability set; the registry
//! maps a platform identifier to an implementation at deploy time. The
//! browser automation behind these calls is out of the control plane's
//! scope — agents ship with a provider, the control plane only selects
//! one.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::{MeetingPlatform, SpeakerTimeframe};

/// Raised by provider operations; carries the platform-visible cause.
#[derive(Debug, thiserror::Error)]
#[error("platform provider error: {0}")]
pub struct ProviderError(pub String);

pub type ProviderResult<T> = Result<T, ProviderError>;

/// What every meeting platform implementation can do.
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    fn platform(&self) -> MeetingPlatform;

    /// Navigate into the meeting; resolves once admitted (or parked in
    /// the waiting room).
    async fn join(&self) -> ProviderResult<()>;

    /// Attend until the meeting ends or a leave is requested.
    async fn run(&self) -> ProviderResult<()>;

    async fn screenshot(&self) -> ProviderResult<Vec<u8>>;

    async fn send_chat_message(&self, text: &str) -> ProviderResult<()>;

    async fn request_leave(&self) -> ProviderResult<()>;

    async fn has_been_removed_from_call(&self) -> ProviderResult<bool>;

    /// Local path of the finished recording, if recording was enabled.
    fn get_recording_path(&self) -> Option<std::path::PathBuf>;

    /// MIME type of the recording artifact.
    fn get_content_type(&self) -> &'static str;

    fn get_speaker_timeframes(&self) -> Vec<SpeakerTimeframe>;

    /// Release browser resources.
    async fn cleanup(&self) -> ProviderResult<()>;
}

/// Deploy-time registry of providers keyed by platform.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<MeetingPlatform, Arc<dyn MeetingProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn MeetingProvider>) {
        self.providers.insert(provider.platform(), provider);
    }

    pub fn get(&self, platform: MeetingPlatform) -> Option<Arc<dyn MeetingProvider>> {
        self.providers.get(&platform).cloned()
    }
}
