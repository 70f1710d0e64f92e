//! SQLite implementation of the API key repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::ports::{ApiKey, ApiKeyRepository};

#[derive(Clone)]
pub struct SqliteApiKeyRepository {
    pool: SqlitePool,
}

impl SqliteApiKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: i64,
    tenant_id: i64,
    label: Option<String>,
    revoked: bool,
    expires_at: Option<String>,
    last_used_at: Option<String>,
}

impl TryFrom<ApiKeyRow> for ApiKey {
    type Error = ControlPlaneError;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        let parse = |raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ControlPlaneError::Database(format!("bad timestamp: {e}")))
        };
        Ok(ApiKey {
            id: row.id,
            tenant_id: row.tenant_id,
            label: row.label,
            revoked: row.revoked,
            expires_at: row.expires_at.as_deref().map(parse).transpose()?,
            last_used_at: row.last_used_at.as_deref().map(parse).transpose()?,
        })
    }
}

#[async_trait]
impl ApiKeyRepository for SqliteApiKeyRepository {
    async fn find_by_hash(&self, key_hash: &str) -> ControlPlaneResult<Option<ApiKey>> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            "SELECT id, tenant_id, label, revoked, expires_at, last_used_at
             FROM api_keys WHERE key_hash = ?",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn touch_last_used(&self, id: i64, at: DateTime<Utc>) -> ControlPlaneResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert(
        &self,
        tenant_id: i64,
        key_hash: &str,
        label: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> ControlPlaneResult<ApiKey> {
        let row: ApiKeyRow = sqlx::query_as(
            r#"INSERT INTO api_keys (tenant_id, key_hash, label, expires_at)
               VALUES (?, ?, ?, ?)
               RETURNING id, tenant_id, label, revoked, expires_at, last_used_at"#,
        )
        .bind(tenant_id)
        .bind(key_hash)
        .bind(label)
        .bind(expires_at.map(|t| t.to_rfc3339()))
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }
}
