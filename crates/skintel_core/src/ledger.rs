use crate::engine::{TaskEngine, require_id};
use crate::error::{EngineError, EngineResult};
use crate::model::TaskCompletion;
use crate::storage::Store;
use time::Date;
use tracing::debug;
use uuid::Uuid;

impl<S: Store> TaskEngine<S> {
    /// Records a completion for the calendar day of `completed_at` (default
    /// today). Returns `false` when that day is already recorded; the ledger
    /// is unchanged in that case.
    pub fn complete_task(
        &self,
        user_id: &str,
        task_id: &str,
        completed_at: Option<Date>,
    ) -> EngineResult<bool> {
        let user_id = require_id(user_id, "user id")?;
        let task_id = require_id(task_id, "task id")?;
        let now = self.now();
        let day = completed_at.unwrap_or_else(|| self.day_of(now));

        let inserted = self.store().transact(|state| {
            if state.task_for_user(user_id, task_id).is_none() {
                return Err(EngineError::not_found(format!("task {task_id} not found")));
            }

            let inserted = state.insert_completion(TaskCompletion {
                id: Uuid::new_v4().to_string(),
                task_id: task_id.to_string(),
                user_id: user_id.to_string(),
                completed_at: day,
                timestamp: now,
            });
            if !inserted {
                return Ok(false);
            }

            if let Some(task) = state.task_for_user_mut(user_id, task_id)
                && task.adaptations.skip_count != 0
            {
                task.adaptations.skip_count = 0;
                task.updated_at = now;
            }
            Ok(true)
        })?;

        if !inserted {
            debug!(user_id, task_id, %day, "task already completed for day");
        }
        Ok(inserted)
    }

    /// Removes the completion for the calendar day of `date` (default today).
    /// Returns `false` when there was nothing to remove.
    pub fn uncomplete_task(
        &self,
        user_id: &str,
        task_id: &str,
        date: Option<Date>,
    ) -> EngineResult<bool> {
        let user_id = require_id(user_id, "user id")?;
        let task_id = require_id(task_id, "task id")?;
        let day = date.unwrap_or_else(|| self.today());

        self.store()
            .transact(|state| Ok(state.remove_completion(task_id, user_id, day)))
    }

    pub fn completions_for_task(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> EngineResult<Vec<TaskCompletion>> {
        let user_id = require_id(user_id, "user id")?;
        let task_id = require_id(task_id, "task id")?;

        self.store().read(|state| {
            if state.task_for_user(user_id, task_id).is_none() {
                return Err(EngineError::not_found(format!("task {task_id} not found")));
            }
            let mut history: Vec<TaskCompletion> = state
                .completions_for_user(user_id)
                .filter(|completion| completion.task_id == task_id)
                .cloned()
                .collect();
            history.sort_by_key(|completion| completion.completed_at);
            Ok(history)
        })?
    }
}
