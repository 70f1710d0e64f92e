//! Tenant and subscription model.
//!
//! Quota enforcement counts bot creations per tenant-local calendar
//! day, so each tenant carries an IANA time zone.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Subscription plan; determines the effective daily bot limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Free,
    Pro,
    PayAsYouGo,
    Custom,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::PayAsYouGo => "pay_as_you_go",
            Self::Custom => "custom",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "pay_as_you_go" | "payg" => Some(Self::PayAsYouGo),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Daily bot allowance for the free plan.
pub const FREE_DAILY_LIMIT: i64 = 10;
/// Daily bot allowance for the pro plan.
pub const PRO_DAILY_LIMIT: i64 = 100;

/// A paying (or free) account that owns bots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub plan: SubscriptionPlan,
    /// Only consulted for `Custom`; null means unlimited.
    pub custom_daily_limit: Option<i64>,
    /// IANA zone name, e.g. `Europe/Berlin`.
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Daily bot creation allowance; `None` means unlimited.
    pub fn effective_daily_limit(&self) -> Option<i64> {
        match self.plan {
            SubscriptionPlan::Free => Some(FREE_DAILY_LIMIT),
            SubscriptionPlan::Pro => Some(PRO_DAILY_LIMIT),
            SubscriptionPlan::PayAsYouGo => None,
            SubscriptionPlan::Custom => self.custom_daily_limit,
        }
    }

    /// Today's calendar date in the tenant's zone. Unknown zone names
    /// fall back to UTC rather than failing bot creation.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => now.with_timezone(&tz).date_naive(),
            Err(_) => now.date_naive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tenant(plan: SubscriptionPlan, custom: Option<i64>, tz: &str) -> Tenant {
        Tenant {
            id: 1,
            name: "acme".into(),
            plan,
            custom_daily_limit: custom,
            timezone: tz.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn plan_limits() {
        assert_eq!(
            tenant(SubscriptionPlan::Free, None, "UTC").effective_daily_limit(),
            Some(FREE_DAILY_LIMIT)
        );
        assert_eq!(
            tenant(SubscriptionPlan::Pro, None, "UTC").effective_daily_limit(),
            Some(PRO_DAILY_LIMIT)
        );
        assert_eq!(
            tenant(SubscriptionPlan::PayAsYouGo, None, "UTC").effective_daily_limit(),
            None
        );
        assert_eq!(
            tenant(SubscriptionPlan::Custom, Some(7), "UTC").effective_daily_limit(),
            Some(7)
        );
        assert_eq!(
            tenant(SubscriptionPlan::Custom, None, "UTC").effective_daily_limit(),
            None
        );
    }

    #[test]
    fn local_date_respects_zone() {
        // 2026-03-01 02:00 UTC is still 2026-02-28 in Los Angeles.
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap();
        let la = tenant(SubscriptionPlan::Free, None, "America/Los_Angeles");
        assert_eq!(
            la.local_date(now),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );

        let utc = tenant(SubscriptionPlan::Free, None, "UTC");
        assert_eq!(
            utc.local_date(now),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap();
        let odd = tenant(SubscriptionPlan::Free, None, "Not/AZone");
        assert_eq!(odd.local_date(now), now.date_naive());
    }
}
