//! SQLite implementation of the tenant repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::{SubscriptionPlan, Tenant};
use crate::domain::ports::TenantRepository;

#[derive(Clone)]
pub struct SqliteTenantRepository {
    pool: SqlitePool,
}

impl SqliteTenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: i64,
    name: String,
    plan: String,
    custom_daily_limit: Option<i64>,
    timezone: String,
    created_at: String,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = ControlPlaneError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        let plan = SubscriptionPlan::from_str(&row.plan)
            .ok_or_else(|| ControlPlaneError::Database(format!("bad plan {:?}", row.plan)))?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Tenant {
            id: row.id,
            name: row.name,
            plan,
            custom_daily_limit: row.custom_daily_limit,
            timezone: row.timezone,
            created_at,
        })
    }
}

#[async_trait]
impl TenantRepository for SqliteTenantRepository {
    async fn get(&self, id: i64) -> ControlPlaneResult<Option<Tenant>> {
        let row: Option<TenantRow> = sqlx::query_as(
            "SELECT id, name, plan, custom_daily_limit, timezone, created_at
             FROM tenants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn insert(
        &self,
        name: &str,
        plan: SubscriptionPlan,
        custom_daily_limit: Option<i64>,
        timezone: &str,
    ) -> ControlPlaneResult<Tenant> {
        let row: TenantRow = sqlx::query_as(
            r#"INSERT INTO tenants (name, plan, custom_daily_limit, timezone, created_at)
               VALUES (?, ?, ?, ?, ?)
               RETURNING id, name, plan, custom_daily_limit, timezone, created_at"#,
        )
        .bind(name)
        .bind(plan.as_str())
        .bind(custom_daily_limit)
        .bind(timezone)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }
}
