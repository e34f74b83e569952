use crate::clock::{Clock, SystemClock, calendar_day};
use crate::error::{EngineError, EngineResult};
use crate::model::{ProfileUpdate, UserProfile};
use crate::planner::Planner;
use crate::storage::Store;
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::info;

/// Entry point for every engine operation. Holds no state of its own beyond
/// the store handle and its collaborators; the operations live in
/// `catalog`, `ledger`, `scoring`, `adaptation`, `lifecycle` and `jobs`.
pub struct TaskEngine<S: Store> {
    store: S,
    planner: Box<dyn Planner>,
    clock: Box<dyn Clock>,
    day_offset: UtcOffset,
}

impl<S: Store> TaskEngine<S> {
    pub fn new(store: S, planner: Box<dyn Planner>) -> Self {
        Self {
            store,
            planner,
            clock: Box::new(SystemClock),
            day_offset: UtcOffset::UTC,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_day_offset(mut self, day_offset: UtcOffset) -> Self {
        self.day_offset = day_offset;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn planner(&self) -> &dyn Planner {
        self.planner.as_ref()
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub(crate) fn day_of(&self, instant: OffsetDateTime) -> Date {
        calendar_day(instant, self.day_offset)
    }

    pub(crate) fn today(&self) -> Date {
        self.day_of(self.now())
    }

    pub fn profile(&self, user_id: &str) -> EngineResult<Option<UserProfile>> {
        let user_id = require_id(user_id, "user id")?;
        self.store.read(|state| state.profile(user_id).cloned())
    }

    /// Replaces the collaborator-owned parts of a user's profile.
    pub fn sync_profile(&self, user_id: &str, update: ProfileUpdate) -> EngineResult<UserProfile> {
        let user_id = require_id(user_id, "user id")?;
        if let Some(entry) = update
            .weekly_plan
            .as_ref()
            .and_then(|plan| plan.iter().find(|entry| !(1..=4).contains(&entry.week)))
        {
            return Err(EngineError::invalid_input(format!(
                "weekly plan week {} is outside 1-4",
                entry.week
            )));
        }

        let profile = self.store.transact(|state| {
            let profile = state.profile_mut(user_id);
            if let Some(weekly_plan) = update.weekly_plan {
                profile.weekly_plan = weekly_plan;
            }
            if let Some(products) = update.products {
                profile.products = products;
            }
            if let Some(subscription) = update.subscription {
                profile.subscription = Some(subscription);
            }
            if let Some(plan) = update.plan {
                profile.plan = plan;
            }
            Ok(profile.clone())
        })?;

        info!(user_id, weeks = profile.weekly_plan.len(), "synced profile");
        Ok(profile)
    }
}

pub(crate) fn require_id<'a>(value: &'a str, what: &str) -> EngineResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid_input(format!("{what} is required")));
    }
    Ok(trimmed)
}
