//! Operator API key port.
//!
//! Keys are stored as SHA-256 digests; lookup is by digest, and every
//! successful use stamps `last_used_at`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::ControlPlaneResult;

#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: i64,
    pub tenant_id: i64,
    pub label: Option<String>,
    pub revoked: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn find_by_hash(&self, key_hash: &str) -> ControlPlaneResult<Option<ApiKey>>;

    async fn touch_last_used(&self, id: i64, at: DateTime<Utc>) -> ControlPlaneResult<()>;

    async fn insert(
        &self,
        tenant_id: i64,
        key_hash: &str,
        label: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> ControlPlaneResult<ApiKey>;
}
