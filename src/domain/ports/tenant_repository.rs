//! Tenant persistence port.

use async_trait::async_trait;

use crate::domain::errors::ControlPlaneResult;
use crate::domain::models::{SubscriptionPlan, Tenant};

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn get(&self, id: i64) -> ControlPlaneResult<Option<Tenant>>;

    async fn insert(
        &self,
        name: &str,
        plan: SubscriptionPlan,
        custom_daily_limit: Option<i64>,
        timezone: &str,
    ) -> ControlPlaneResult<Tenant>;
}
