use crate::engine::{TaskEngine, require_id};
use crate::error::{EngineError, EngineResult};
use crate::model::{Adaptations, Product, Task, WeeklyPlanEntry, schedule_order};
use crate::planner::{TaskDraft, parse_week_drafts};
use crate::storage::{EngineState, Store};
use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum GenerationOutcome {
    /// An active generation already existed and `force` was not set.
    Skipped,
    Created { generation: u32, task_count: usize },
}

/// A drafted task with its catalog matches resolved, ready to persist.
#[derive(Debug, Clone)]
pub(crate) struct MaterializedDraft {
    week: u8,
    draft: TaskDraft,
    user_products: Option<Vec<String>>,
}

impl<S: Store> TaskEngine<S> {
    pub fn generate_tasks_for_user(
        &self,
        user_id: &str,
        weekly_plan: &[WeeklyPlanEntry],
        user_products: &[Product],
        force: bool,
    ) -> EngineResult<GenerationOutcome> {
        let user_id = require_id(user_id, "user id")?;
        if weekly_plan.is_empty() {
            return Err(EngineError::invalid_input("weekly plan is empty"));
        }

        if !force && self.store().read(|state| state.has_active_generation(user_id))? {
            debug!(user_id, "active generation exists, skipping");
            return Ok(GenerationOutcome::Skipped);
        }

        let drafts = self.draft_generation(user_id, weekly_plan, user_products)?;
        let now = self.now();
        let outcome = self.store().transact(|state| {
            // Another caller may have committed while the planner was running.
            if !force && state.has_active_generation(user_id) {
                return Ok(GenerationOutcome::Skipped);
            }
            Ok(commit_generation(state, user_id, drafts, now))
        })?;

        if let GenerationOutcome::Created {
            generation,
            task_count,
        } = outcome
        {
            info!(user_id, generation, task_count, force, "materialized task generation");
        }
        Ok(outcome)
    }

    /// Generates from the weekly plan and product catalog in the user's profile.
    pub fn generate_from_profile(
        &self,
        user_id: &str,
        force: bool,
    ) -> EngineResult<GenerationOutcome> {
        let user_id = require_id(user_id, "user id")?;
        let profile = self
            .store()
            .read(|state| state.profile(user_id).cloned())?
            .unwrap_or_default();
        self.generate_tasks_for_user(user_id, &profile.weekly_plan, &profile.products, force)
    }

    pub fn active_tasks(&self, user_id: &str) -> EngineResult<Vec<Task>> {
        let user_id = require_id(user_id, "user id")?;
        self.store().read(|state| {
            let mut tasks: Vec<Task> = state.active_tasks(user_id).cloned().collect();
            tasks.sort_by(|left, right| {
                left.week
                    .cmp(&right.week)
                    .then_with(|| schedule_order(left, right))
            });
            tasks
        })
    }

    pub fn tasks_for_week(&self, user_id: &str, week: u8) -> EngineResult<Vec<Task>> {
        if !(1..=4).contains(&week) {
            return Err(EngineError::invalid_input("week must be between 1 and 4"));
        }
        let user_id = require_id(user_id, "user id")?;
        self.store()
            .read(|state| active_tasks_for_week(state, user_id, week))
    }

    /// Consults the planner for every plan week and resolves product matches.
    /// Nothing is written here, so a planner failure leaves no trace.
    pub(crate) fn draft_generation(
        &self,
        user_id: &str,
        weekly_plan: &[WeeklyPlanEntry],
        user_products: &[Product],
    ) -> EngineResult<Vec<MaterializedDraft>> {
        let mut weeks: BTreeMap<u8, &WeeklyPlanEntry> = BTreeMap::new();
        for entry in weekly_plan.iter().filter(|entry| (1..=4).contains(&entry.week)) {
            weeks.entry(entry.week).or_insert(entry);
        }
        if weeks.is_empty() {
            return Err(EngineError::generation_failed(
                "weekly plan has no week between 1 and 4",
            ));
        }

        let mut drafts = Vec::new();
        for (week, entry) in weeks {
            let raw = self.planner().draft_week(user_id, entry)?;
            for draft in parse_week_drafts(week, &raw)? {
                let user_products = match_user_products(&draft.recommended_products, user_products);
                drafts.push(MaterializedDraft {
                    week,
                    draft,
                    user_products,
                });
            }
        }
        Ok(drafts)
    }
}

pub(crate) fn active_tasks_for_week(state: &EngineState, user_id: &str, week: u8) -> Vec<Task> {
    let mut tasks: Vec<Task> = state
        .active_tasks(user_id)
        .filter(|task| task.week == week)
        .cloned()
        .collect();
    tasks.sort_by(schedule_order);
    tasks
}

/// Supersedes the user's active generation with `drafts`. Runs inside a
/// store transaction.
pub(crate) fn commit_generation(
    state: &mut EngineState,
    user_id: &str,
    drafts: Vec<MaterializedDraft>,
    now: OffsetDateTime,
) -> GenerationOutcome {
    let superseded = state.deactivate_generation(user_id, now);
    let generation = state.latest_generation(user_id) + 1;
    let task_count = drafts.len();

    for materialized in drafts {
        let MaterializedDraft {
            week,
            draft,
            user_products,
        } = materialized;
        state.tasks.push(Task {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            generation,
            week,
            title: draft.title,
            description: draft.description,
            time_of_day: draft.time_of_day,
            category: draft.category,
            priority: draft.priority,
            recommended_products: draft.recommended_products,
            user_products,
            is_active: true,
            adaptations: Adaptations::default(),
            created_at: now,
            updated_at: now,
        });
    }

    debug!(user_id, superseded, generation, "committed generation");
    GenerationOutcome::Created {
        generation,
        task_count,
    }
}

/// Case-insensitive substring match of each tag against product names and
/// categories. Ids keep catalog order without duplicates; `None` when
/// nothing matched.
pub fn match_user_products(tags: &[String], products: &[Product]) -> Option<Vec<String>> {
    let tags: Vec<String> = tags
        .iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect();
    if tags.is_empty() {
        return None;
    }

    let matched: Vec<String> = products
        .iter()
        .filter(|product| {
            let name = product.name.to_lowercase();
            let category = product.category.to_lowercase();
            tags.iter()
                .any(|tag| name.contains(tag.as_str()) || category.contains(tag.as_str()))
        })
        .map(|product| product.id.clone())
        .fold(Vec::new(), |mut ids, id| {
            if !ids.contains(&id) {
                ids.push(id);
            }
            ids
        });

    if matched.is_empty() { None } else { Some(matched) }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Planner output for one week: two critical tasks and one optional.
    pub const WEEK_BODY: &str = r#"{"tasks": [
        {"title": "Gentle cleanse", "description": "Lukewarm water", "timeOfDay": "morning",
         "category": "cleansing", "priority": "critical", "recommendedProducts": ["cleanser"]},
        {"title": "Apply sunscreen", "description": "SPF 50", "timeOfDay": "morning",
         "category": "protection", "priority": "critical", "recommendedProducts": ["spf"]},
        {"title": "Hydrating mask", "description": "Twice a week", "timeOfDay": "evening",
         "category": "moisturizing", "priority": "optional", "recommendedProducts": []}
    ]}"#;
}
