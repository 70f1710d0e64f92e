//! Tenant daily usage counter port.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::errors::ControlPlaneResult;

#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Current count for (tenant, local date); 0 when no row exists.
    async fn daily_count(&self, tenant_id: i64, date: NaiveDate) -> ControlPlaneResult<i64>;

    /// Atomic validate-and-increment: bump the counter only while it is
    /// below `limit` (`None` = unlimited). Returns the new count on
    /// success, or `None` when the limit was already reached — the
    /// check and the increment are one conditional update, so a burst
    /// of concurrent creations cannot over-approve.
    async fn try_increment(
        &self,
        tenant_id: i64,
        date: NaiveDate,
        limit: Option<i64>,
    ) -> ControlPlaneResult<Option<i64>>;

    /// Compensating decrement for an admitted creation that failed
    /// before the bot row existed. Never drops below zero.
    async fn decrement(&self, tenant_id: i64, date: NaiveDate) -> ControlPlaneResult<()>;
}
