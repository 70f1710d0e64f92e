//! Artifact object-store port.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::ControlPlaneResult;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ControlPlaneResult<()>;

    /// Time-limited download URL for a stored object.
    async fn get_signed_url(&self, key: &str, ttl: Duration) -> ControlPlaneResult<String>;
}
