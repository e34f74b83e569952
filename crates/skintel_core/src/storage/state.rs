use crate::error::EngineError;
use crate::model::{Task, TaskCompletion, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use time::{Date, OffsetDateTime};

/// Everything the engine persists: task generations, the completion ledger
/// and the per-user collaborator mirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub completions: Vec<TaskCompletion>,
    #[serde(default)]
    pub profiles: BTreeMap<String, UserProfile>,
}

impl EngineState {
    pub fn profile(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    pub fn profile_mut(&mut self, user_id: &str) -> &mut UserProfile {
        self.profiles.entry(user_id.to_string()).or_default()
    }

    pub fn task_for_user(&self, user_id: &str, task_id: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|task| task.id == task_id && task.user_id == user_id)
    }

    pub fn task_for_user_mut(&mut self, user_id: &str, task_id: &str) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == task_id && task.user_id == user_id)
    }

    pub fn active_tasks<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .iter()
            .filter(move |task| task.is_active && task.user_id == user_id)
    }

    pub fn has_active_generation(&self, user_id: &str) -> bool {
        self.active_tasks(user_id).next().is_some()
    }

    pub fn latest_generation(&self, user_id: &str) -> u32 {
        self.tasks
            .iter()
            .filter(|task| task.user_id == user_id)
            .map(|task| task.generation)
            .max()
            .unwrap_or(0)
    }

    /// Marks every active task of the user inactive and returns how many
    /// rows changed. Rows are kept for historical scoring.
    pub fn deactivate_generation(&mut self, user_id: &str, now: OffsetDateTime) -> usize {
        let mut changed = 0;
        for task in self
            .tasks
            .iter_mut()
            .filter(|task| task.is_active && task.user_id == user_id)
        {
            task.is_active = false;
            task.updated_at = now;
            changed += 1;
        }
        changed
    }

    pub fn users_with_active_generation(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .tasks
            .iter()
            .filter(|task| task.is_active)
            .map(|task| task.user_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        users.sort();
        users
    }

    pub fn completion(&self, task_id: &str, user_id: &str, day: Date) -> Option<&TaskCompletion> {
        self.completions
            .iter()
            .find(|completion| completion.matches(task_id, user_id, day))
    }

    /// Inserts unless the (task, user, day) key is already taken.
    pub fn insert_completion(&mut self, completion: TaskCompletion) -> bool {
        if self
            .completion(&completion.task_id, &completion.user_id, completion.completed_at)
            .is_some()
        {
            return false;
        }
        self.completions.push(completion);
        true
    }

    pub fn remove_completion(&mut self, task_id: &str, user_id: &str, day: Date) -> bool {
        let before = self.completions.len();
        self.completions
            .retain(|completion| !completion.matches(task_id, user_id, day));
        self.completions.len() != before
    }

    pub fn completions_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a TaskCompletion> + 'a {
        self.completions
            .iter()
            .filter(move |completion| completion.user_id == user_id)
    }

    /// Structural checks applied whenever persisted state is loaded.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut task_owners = HashMap::new();
        for task in &self.tasks {
            if !(1..=4).contains(&task.week) {
                return Err(EngineError::invalid_data(format!(
                    "task {} has week {} outside 1-4",
                    task.id, task.week
                )));
            }
            if task_owners.insert(task.id.as_str(), task.user_id.as_str()).is_some() {
                return Err(EngineError::invalid_data(format!(
                    "duplicate task id {}",
                    task.id
                )));
            }
        }

        let mut active_generations: HashMap<&str, u32> = HashMap::new();
        for task in self.tasks.iter().filter(|task| task.is_active) {
            match active_generations.insert(task.user_id.as_str(), task.generation) {
                Some(previous) if previous != task.generation => {
                    return Err(EngineError::invalid_data(format!(
                        "user {} has more than one active generation",
                        task.user_id
                    )));
                }
                _ => {}
            }
        }

        let mut keys = HashSet::new();
        for completion in &self.completions {
            match task_owners.get(completion.task_id.as_str()) {
                Some(owner) if *owner == completion.user_id => {}
                _ => {
                    return Err(EngineError::invalid_data(format!(
                        "completion {} references an unknown task",
                        completion.id
                    )));
                }
            }
            let key = (
                completion.task_id.as_str(),
                completion.user_id.as_str(),
                completion.completed_at,
            );
            if !keys.insert(key) {
                return Err(EngineError::invalid_data(format!(
                    "duplicate completion for task {} on {}",
                    completion.task_id, completion.completed_at
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::EngineState;
    use crate::model::fixtures::task;
    use crate::model::{Priority, TaskCompletion, TimeOfDay};
    use time::macros::{date, datetime};

    fn completion(id: &str, task_id: &str) -> TaskCompletion {
        TaskCompletion {
            id: id.to_string(),
            task_id: task_id.to_string(),
            user_id: "user-1".to_string(),
            completed_at: date!(2025 - 03 - 03),
            timestamp: datetime!(2025-03-03 09:00 UTC),
        }
    }

    #[test]
    fn insert_completion_rejects_duplicate_key() {
        let mut state = EngineState {
            tasks: vec![task("t1", "user-1", 1, Priority::Critical, TimeOfDay::Morning)],
            ..EngineState::default()
        };

        assert!(state.insert_completion(completion("c1", "t1")));
        assert!(!state.insert_completion(completion("c2", "t1")));
        assert_eq!(state.completions.len(), 1);
        assert_eq!(state.completions[0].id, "c1");
    }

    #[test]
    fn deactivate_generation_keeps_rows() {
        let mut state = EngineState {
            tasks: vec![
                task("t1", "user-1", 1, Priority::Critical, TimeOfDay::Morning),
                task("t2", "user-2", 1, Priority::Critical, TimeOfDay::Morning),
            ],
            ..EngineState::default()
        };

        let changed = state.deactivate_generation("user-1", datetime!(2025-03-04 00:00 UTC));

        assert_eq!(changed, 1);
        assert_eq!(state.tasks.len(), 2);
        assert!(!state.has_active_generation("user-1"));
        assert!(state.has_active_generation("user-2"));
    }

    #[test]
    fn validate_rejects_two_active_generations() {
        let mut second = task("t2", "user-1", 1, Priority::Optional, TimeOfDay::Evening);
        second.generation = 2;
        let state = EngineState {
            tasks: vec![
                task("t1", "user-1", 1, Priority::Critical, TimeOfDay::Morning),
                second,
            ],
            ..EngineState::default()
        };

        let err = state.validate().unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn validate_rejects_dangling_completion() {
        let state = EngineState {
            completions: vec![completion("c1", "missing")],
            ..EngineState::default()
        };

        let err = state.validate().unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }
}
