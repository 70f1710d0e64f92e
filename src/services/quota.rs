//! Per-tenant daily quota gate.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::domain::errors::{ControlPlaneError, ControlPlaneResult};
use crate::domain::models::Tenant;
use crate::domain::ports::UsageRepository;

/// Answer to "may this tenant create another bot today?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// `None` means unlimited.
    pub limit: Option<i64>,
    pub usage: i64,
    pub reason: Option<String>,
}

pub struct QuotaGate {
    usage: Arc<dyn UsageRepository>,
}

impl QuotaGate {
    pub fn new(usage: Arc<dyn UsageRepository>) -> Self {
        Self { usage }
    }

    /// Read-only check, for display and pre-flight validation. The
    /// admitting path is [`admit`](Self::admit), which checks and
    /// increments atomically.
    #[instrument(skip(self, tenant), fields(tenant_id = tenant.id), err)]
    pub async fn validate_bot_creation(&self, tenant: &Tenant) -> ControlPlaneResult<QuotaDecision> {
        let limit = tenant.effective_daily_limit();
        let date = tenant.local_date(Utc::now());
        let usage = self.usage.daily_count(tenant.id, date).await?;

        let allowed = limit.map_or(true, |l| usage < l);
        Ok(QuotaDecision {
            allowed,
            limit,
            usage,
            reason: (!allowed).then(|| {
                format!(
                    "daily bot limit reached: {usage}/{} for {date}",
                    limit.unwrap_or(0)
                )
            }),
        })
    }

    /// Atomic check-and-increment against today's counter in the
    /// tenant's time zone. The conditional update both validates and
    /// consumes the allowance, so concurrent bursts cannot exceed the
    /// limit.
    #[instrument(skip(self, tenant), fields(tenant_id = tenant.id), err)]
    pub async fn admit(&self, tenant: &Tenant) -> ControlPlaneResult<i64> {
        let limit = tenant.effective_daily_limit();
        let date = tenant.local_date(Utc::now());

        match self.usage.try_increment(tenant.id, date, limit).await? {
            Some(count) => {
                info!(tenant_id = tenant.id, count, ?limit, "bot creation admitted");
                Ok(count)
            }
            None => {
                let usage = self.usage.daily_count(tenant.id, date).await?;
                Err(ControlPlaneError::QuotaExceeded {
                    usage,
                    limit: limit.unwrap_or(0),
                })
            }
        }
    }

    /// Give an admitted allowance back when the creation failed before
    /// the bot row existed.
    #[instrument(skip(self, tenant), fields(tenant_id = tenant.id), err)]
    pub async fn refund(&self, tenant: &Tenant) -> ControlPlaneResult<()> {
        let date = tenant.local_date(Utc::now());
        self.usage.decrement(tenant.id, date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{connection::create_test_pool, migrations, SqliteUsageRepository};
    use crate::domain::models::SubscriptionPlan;

    async fn setup() -> QuotaGate {
        let pool = create_test_pool().await.unwrap();
        migrations::migrate(&pool).await.unwrap();
        sqlx::query("INSERT INTO tenants (name, plan, timezone) VALUES ('t', 'custom', 'UTC')")
            .execute(&pool)
            .await
            .unwrap();
        QuotaGate::new(Arc::new(SqliteUsageRepository::new(pool)))
    }

    fn tenant(plan: SubscriptionPlan, custom: Option<i64>) -> Tenant {
        Tenant {
            id: 1,
            name: "acme".into(),
            plan,
            custom_daily_limit: custom,
            timezone: "UTC".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn admit_consumes_the_allowance() {
        let gate = setup().await;
        let tenant = tenant(SubscriptionPlan::Custom, Some(2));

        assert_eq!(gate.admit(&tenant).await.unwrap(), 1);
        assert_eq!(gate.admit(&tenant).await.unwrap(), 2);

        let err = gate.admit(&tenant).await.unwrap_err();
        assert!(matches!(
            err,
            ControlPlaneError::QuotaExceeded { usage: 2, limit: 2 }
        ));
    }

    #[tokio::test]
    async fn validate_reports_without_consuming() {
        let gate = setup().await;
        let tenant = tenant(SubscriptionPlan::Custom, Some(3));

        let decision = gate.validate_bot_creation(&tenant).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.usage, 0);
        assert_eq!(decision.limit, Some(3));

        // Validation alone never moves the counter.
        let decision = gate.validate_bot_creation(&tenant).await.unwrap();
        assert_eq!(decision.usage, 0);
    }

    #[tokio::test]
    async fn refund_restores_the_allowance() {
        let gate = setup().await;
        let tenant = tenant(SubscriptionPlan::Custom, Some(1));

        gate.admit(&tenant).await.unwrap();
        assert!(gate.admit(&tenant).await.is_err());

        gate.refund(&tenant).await.unwrap();
        assert_eq!(gate.admit(&tenant).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unlimited_plans_always_pass() {
        let gate = setup().await;
        let tenant = tenant(SubscriptionPlan::PayAsYouGo, None);

        for _ in 0..20 {
            gate.admit(&tenant).await.unwrap();
        }
        let decision = gate.validate_bot_creation(&tenant).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.limit, None);
        assert_eq!(decision.usage, 20);
    }

    #[tokio::test]
    async fn denial_carries_a_reason() {
        let gate = setup().await;
        let tenant = tenant(SubscriptionPlan::Custom, Some(0));

        let decision = gate.validate_bot_creation(&tenant).await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("daily bot limit"));
    }
}
