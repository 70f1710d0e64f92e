//! SQLite implementation of the tenant daily usage counter.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::domain::errors::ControlPlaneResult;
use crate::domain::ports::UsageRepository;

#[derive(Clone)]
pub struct SqliteUsageRepository {
    pool: SqlitePool,
}

impl SqliteUsageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for SqliteUsageRepository {
    async fn daily_count(&self, tenant_id: i64, date: NaiveDate) -> ControlPlaneResult<i64> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT count FROM daily_usage WHERE tenant_id = ? AND usage_date = ?",
        )
        .bind(tenant_id)
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(c,)| c).unwrap_or(0))
    }

    async fn try_increment(
        &self,
        tenant_id: i64,
        date: NaiveDate,
        limit: Option<i64>,
    ) -> ControlPlaneResult<Option<i64>> {
        let Some(limit) = limit else {
            // Unlimited plan: plain upsert.
            let row: (i64,) = sqlx::query_as(
                r#"INSERT INTO daily_usage (tenant_id, usage_date, count) VALUES (?, ?, 1)
                   ON CONFLICT(tenant_id, usage_date) DO UPDATE SET count = count + 1
                   RETURNING count"#,
            )
            .bind(tenant_id)
            .bind(date.to_string())
            .fetch_one(&self.pool)
            .await?;
            return Ok(Some(row.0));
        };

        if limit <= 0 {
            return Ok(None);
        }

        // Check and increment in one statement: the DO UPDATE only
        // fires while the count is still below the limit, so a burst
        // of concurrent creations cannot over-approve.
        let row: Option<(i64,)> = sqlx::query_as(
            r#"INSERT INTO daily_usage (tenant_id, usage_date, count) VALUES (?, ?, 1)
               ON CONFLICT(tenant_id, usage_date) DO UPDATE SET count = count + 1
               WHERE daily_usage.count < ?
               RETURNING count"#,
        )
        .bind(tenant_id)
        .bind(date.to_string())
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(c,)| c))
    }

    async fn decrement(&self, tenant_id: i64, date: NaiveDate) -> ControlPlaneResult<()> {
        sqlx::query(
            "UPDATE daily_usage SET count = count - 1
             WHERE tenant_id = ? AND usage_date = ? AND count > 0",
        )
        .bind(tenant_id)
        .bind(date.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
