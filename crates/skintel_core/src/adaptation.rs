use crate::engine::{TaskEngine, require_id};
use crate::error::EngineResult;
use crate::model::{AdaptationType, Priority, Task, TaskAdaptationResult, TimeOfDay};
use crate::storage::Store;
use time::{Date, Duration, OffsetDateTime};
use tracing::info;

/// Days a task must go without a completion before it is adapted, counting
/// today.
pub const ADAPTATION_WINDOW_DAYS: i64 = 3;

impl<S: Store> TaskEngine<S> {
    /// Relaxes the schedule of active tasks nobody completed during the
    /// trailing window. Tasks are only ever mutated in place.
    pub fn adapt_tasks_for_user(&self, user_id: &str) -> EngineResult<Vec<TaskAdaptationResult>> {
        let user_id = require_id(user_id, "user id")?;
        let now = self.now();
        let today = self.day_of(now);
        let window_start = today - Duration::days(ADAPTATION_WINDOW_DAYS - 1);
        let window = window_start..=today;

        let results = self.store().transact(|state| {
            let idle: Vec<String> = state
                .active_tasks(user_id)
                .filter(|task| self.day_of(task.created_at) < window_start)
                .filter(|task| {
                    !state.completions_for_user(user_id).any(|completion| {
                        completion.task_id == task.id && window.contains(&completion.completed_at)
                    })
                })
                .map(|task| task.id.clone())
                .collect();

            let mut results = Vec::with_capacity(idle.len());
            for task_id in idle {
                if let Some(task) = state.task_for_user_mut(user_id, &task_id) {
                    results.push(adapt_idle_task(task, today, now));
                }
            }
            Ok(results)
        })?;

        for result in &results {
            info!(
                user_id,
                task_id = %result.task_id,
                adaptation = result.adaptation_type.as_str(),
                "adapted task"
            );
        }
        Ok(results)
    }
}

fn adapt_idle_task(task: &mut Task, today: Date, now: OffsetDateTime) -> TaskAdaptationResult {
    task.updated_at = now;

    if task.time_of_day == TimeOfDay::Evening {
        task.time_of_day = TimeOfDay::Morning;
        task.adaptations.time_adjusted = true;
        return TaskAdaptationResult {
            task_id: task.id.clone(),
            adaptation_type: AdaptationType::TimeAdjusted,
            reason: format!(
                "not completed in the last {ADAPTATION_WINDOW_DAYS} days, moved from evening to morning"
            ),
            new_time_of_day: Some(TimeOfDay::Morning),
        };
    }

    task.priority = Priority::Optional;
    task.adaptations.skip_count += 1;
    task.adaptations.last_skipped = Some(today);
    TaskAdaptationResult {
        task_id: task.id.clone(),
        adaptation_type: AdaptationType::MadeOptional,
        reason: format!(
            "not completed in the last {ADAPTATION_WINDOW_DAYS} days, skipped {} times",
            task.adaptations.skip_count
        ),
        new_time_of_day: None,
    }
}
