//! Request authentication.
//!
//! Operators present a long-lived API key (`X-Api-Key`), checked for
//! revocation and expiry with every use stamped. Agents present the
//! deployment-injected system token as a bearer credential and may only
//! touch agent endpoints.

use axum::http::HeaderMap;
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::Tenant;

use super::state::Services;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Hex SHA-256 digest under which API keys are stored.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolve the calling tenant from an API key header.
pub async fn authenticate_operator(
    services: &Services,
    headers: &HeaderMap,
) -> ControlPlaneResult<Tenant> {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ControlPlaneError::Unauthorized("missing API key".to_string()))?;

    let api_key = services
        .api_keys
        .find_by_hash(&hash_api_key(key))
        .await?
        .ok_or_else(|| ControlPlaneError::Unauthorized("unknown API key".to_string()))?;

    if api_key.revoked {
        return Err(ControlPlaneError::Unauthorized("API key revoked".to_string()));
    }
    if let Some(expires_at) = api_key.expires_at {
        if expires_at < Utc::now() {
            return Err(ControlPlaneError::Unauthorized("API key expired".to_string()));
        }
    }

    services
        .api_keys
        .touch_last_used(api_key.id, Utc::now())
        .await?;

    services
        .tenants
        .get(api_key.tenant_id)
        .await?
        .ok_or(ControlPlaneError::TenantNotFound(api_key.tenant_id))
}

/// Verify the agent system token on agent endpoints.
pub fn authenticate_agent(services: &Services, headers: &HeaderMap) -> ControlPlaneResult<()> {
    let expected = &services.config.server.agent_token;
    if expected.is_empty() {
        return Err(ControlPlaneError::Unauthorized(
            "agent token not configured".to_string(),
        ));
    }

    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ControlPlaneError::Unauthorized("missing bearer token".to_string()))?;

    if presented != expected {
        return Err(ControlPlaneError::Unauthorized("bad agent token".to_string()));
    }
    Ok(())
}
