//! Plan renewal.
//!
//! A plan period goes stale when the subscription moves on without it. The
//! renewal drafts a new generation first and only then opens one store
//! transaction that swaps the plan dates and the active generation together.
//! A planner failure therefore leaves the user exactly where they were.

use crate::catalog::{GenerationOutcome, commit_generation};
use crate::engine::{TaskEngine, require_id};
use crate::error::EngineResult;
use crate::model::{PlanPeriod, PlanType, UserProfile};
use crate::storage::Store;
use serde::{Serialize, Serializer};
use std::fmt;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LifecycleOutcome {
    /// Plan period is current and tasks exist.
    Current,
    /// Plan period was current but had no tasks; a generation was created.
    Generated { generation: u32 },
    Regenerated {
        generation: u32,
        #[serde(serialize_with = "serialize_plan")]
        plan: PlanPeriod,
    },
    /// Regeneration failed; nothing was written.
    RolledBack { reason: String },
    /// First-time generation failed; retried on the next call.
    GenerationDeferred { reason: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanDates {
    #[serde(with = "time::serde::rfc3339::option")]
    plan_start_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    plan_end_date: Option<OffsetDateTime>,
}

fn serialize_plan<S: Serializer>(plan: &PlanPeriod, serializer: S) -> Result<S::Ok, S::Error> {
    PlanDates {
        plan_start_date: plan.plan_start_date,
        plan_end_date: plan.plan_end_date,
    }
    .serialize(serializer)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    SubscriptionExpired,
    NoPlanPeriod,
    PlanEnded,
    PlanPredatesWindow,
}

impl StaleReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubscriptionExpired => "subscription_expired",
            Self::NoPlanPeriod => "no_plan_period",
            Self::PlanEnded => "plan_ended",
            Self::PlanPredatesWindow => "plan_predates_window",
        }
    }
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the profile's plan period no longer matches its subscription, if it
/// doesn't.
///
/// A past expiry only counts against a plan that started before it. The
/// period opened by renewing after expiry is current until it ends.
pub fn stale_reason(
    profile: &UserProfile,
    plan_type: PlanType,
    now: OffsetDateTime,
) -> Option<StaleReason> {
    let expires_at = profile
        .subscription
        .as_ref()
        .and_then(|subscription| subscription.subscription_expires_at);
    let bounds = profile.plan.bounds();

    if let Some(expires_at) = expires_at
        && expires_at < now
        && bounds.is_none_or(|(start, _end)| start < expires_at)
    {
        return Some(StaleReason::SubscriptionExpired);
    }
    let Some((start, _end)) = bounds else {
        return Some(StaleReason::NoPlanPeriod);
    };
    if profile.plan.has_ended(now) {
        return Some(StaleReason::PlanEnded);
    }
    if let Some(expires_at) = expires_at
        && start < expires_at - plan_type.period()
    {
        return Some(StaleReason::PlanPredatesWindow);
    }
    None
}

impl<S: Store> TaskEngine<S> {
    pub fn ensure_tasks_for_plan_type(
        &self,
        user_id: &str,
        plan_type: PlanType,
    ) -> EngineResult<LifecycleOutcome> {
        let user_id = require_id(user_id, "user id")?;
        let now = self.now();
        let profile = self
            .store()
            .read(|state| state.profile(user_id).cloned())?
            .unwrap_or_default();

        if let Some(reason) = stale_reason(&profile, plan_type, now) {
            return self.renew_plan(user_id, plan_type, &profile, reason, now);
        }

        if self
            .store()
            .read(|state| state.has_active_generation(user_id))?
        {
            return Ok(LifecycleOutcome::Current);
        }

        match self.generate_from_profile(user_id, false) {
            Ok(GenerationOutcome::Created { generation, .. }) => {
                Ok(LifecycleOutcome::Generated { generation })
            }
            Ok(GenerationOutcome::Skipped) => Ok(LifecycleOutcome::Current),
            Err(err) => {
                debug!(user_id, error = %err, "initial generation deferred");
                Ok(LifecycleOutcome::GenerationDeferred {
                    reason: err.to_string(),
                })
            }
        }
    }

    fn renew_plan(
        &self,
        user_id: &str,
        plan_type: PlanType,
        profile: &UserProfile,
        reason: StaleReason,
        now: OffsetDateTime,
    ) -> EngineResult<LifecycleOutcome> {
        info!(user_id, %reason, plan_type = plan_type.as_str(), "plan is stale, regenerating");

        let drafts =
            match self.draft_generation(user_id, &profile.weekly_plan, &profile.products) {
                Ok(drafts) => drafts,
                Err(err) => {
                    warn!(user_id, error = %err, "plan regeneration failed, previous plan kept");
                    return Ok(LifecycleOutcome::RolledBack {
                        reason: err.to_string(),
                    });
                }
            };

        let plan = PlanPeriod::starting_at(now, plan_type.period());
        let committed = self.store().transact(|state| {
            let current = state.profile(user_id).cloned().unwrap_or_default();
            if stale_reason(&current, plan_type, now).is_none() {
                return Ok(None);
            }
            state.profile_mut(user_id).plan = plan;
            Ok(Some(commit_generation(state, user_id, drafts, now)))
        })?;

        match committed {
            Some(GenerationOutcome::Created {
                generation,
                task_count,
            }) => {
                info!(user_id, generation, task_count, "plan renewed");
                Ok(LifecycleOutcome::Regenerated { generation, plan })
            }
            Some(GenerationOutcome::Skipped) | None => {
                debug!(user_id, "plan already renewed by another caller");
                Ok(LifecycleOutcome::Current)
            }
        }
    }
}
