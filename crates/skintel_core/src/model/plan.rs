use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// One week of the externally authored improvement plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlanEntry {
    pub week: u8,
    pub preview: String,
    #[serde(default, alias = "improvement_expected", skip_serializing_if = "Option::is_none")]
    pub improvement_expected: Option<String>,
    #[serde(
        default,
        alias = "weekly_improvement_score",
        skip_serializing_if = "Option::is_none"
    )]
    pub weekly_improvement_score: Option<f64>,
}

/// A scanned product from the user's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    Weekly,
    Monthly,
}

impl PlanType {
    pub fn period_days(self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 28,
        }
    }

    pub fn period(self) -> Duration {
        Duration::days(self.period_days())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan_type: PlanType,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub subscription_expires_at: Option<OffsetDateTime>,
}

/// The window during which the active task generation is current. Both
/// bounds stay empty until the first analysis produces a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPeriod {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub plan_start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub plan_end_date: Option<OffsetDateTime>,
}

impl PlanPeriod {
    pub fn starting_at(start: OffsetDateTime, length: Duration) -> Self {
        Self {
            plan_start_date: Some(start),
            plan_end_date: Some(start + length),
        }
    }

    pub fn bounds(&self) -> Option<(OffsetDateTime, OffsetDateTime)> {
        match (self.plan_start_date, self.plan_end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn has_ended(&self, now: OffsetDateTime) -> bool {
        self.plan_end_date.is_some_and(|end| end <= now)
    }
}

/// Collaborator-owned state mirrored per user inside the engine's store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub weekly_plan: Vec<WeeklyPlanEntry>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
    #[serde(default)]
    pub plan: PlanPeriod,
}

/// Partial replacement of a [`UserProfile`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub weekly_plan: Option<Vec<WeeklyPlanEntry>>,
    #[serde(default)]
    pub products: Option<Vec<Product>>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
    #[serde(default)]
    pub plan: Option<PlanPeriod>,
}

#[cfg(test)]
mod tests {
    use super::{PlanPeriod, PlanType, ProfileUpdate, WeeklyPlanEntry};
    use time::Duration;
    use time::macros::datetime;

    #[test]
    fn plan_period_ends_exactly_at_end_date() {
        let start = datetime!(2025-03-03 08:00 UTC);
        let period = PlanPeriod::starting_at(start, PlanType::Monthly.period());

        assert_eq!(period.plan_end_date, Some(start + Duration::days(28)));
        assert!(!period.has_ended(start + Duration::days(27)));
        assert!(period.has_ended(start + Duration::days(28)));
    }

    #[test]
    fn empty_plan_period_has_no_bounds() {
        let period = PlanPeriod {
            plan_start_date: Some(datetime!(2025-03-03 08:00 UTC)),
            plan_end_date: None,
        };

        assert!(period.bounds().is_none());
        assert!(!period.has_ended(datetime!(2030-01-01 00:00 UTC)));
    }

    #[test]
    fn weekly_plan_entry_accepts_snake_case_collaborator_fields() {
        let entry: WeeklyPlanEntry = serde_json::from_str(
            r#"{"week": 2, "preview": "Barrier repair", "weekly_improvement_score": 12.5}"#,
        )
        .unwrap();

        assert_eq!(entry.week, 2);
        assert_eq!(entry.weekly_improvement_score, Some(12.5));
        assert_eq!(entry.improvement_expected, None);
    }

    #[test]
    fn profile_update_parses_plan_type_literals() {
        let update: ProfileUpdate = serde_json::from_str(
            r#"{"subscription": {"plan_type": "WEEKLY", "subscription_expires_at": null}}"#,
        )
        .unwrap();

        let subscription = update.subscription.unwrap();
        assert_eq!(subscription.plan_type, PlanType::Weekly);
        assert_eq!(subscription.subscription_expires_at, None);
        assert!(update.weekly_plan.is_none());
    }
}
