//! Screenshot metadata port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ControlPlaneResult;
use crate::domain::models::{ScreenshotRecord, ScreenshotType};

#[async_trait]
pub trait ScreenshotRepository: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn insert(
        &self,
        bot_id: i64,
        object_key: &str,
        shot_type: ScreenshotType,
        bot_state: &str,
        trigger_event: Option<&str>,
        captured_at: DateTime<Utc>,
    ) -> ControlPlaneResult<ScreenshotRecord>;

    async fn list_for_bot(&self, bot_id: i64) -> ControlPlaneResult<Vec<ScreenshotRecord>>;
}
