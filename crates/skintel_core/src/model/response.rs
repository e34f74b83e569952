use crate::model::{Category, Priority, Task, TaskCompletion, TimeOfDay};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub time_of_day: TimeOfDay,
    pub category: Category,
    pub priority: Priority,
    pub recommended_products: Vec<String>,
    pub user_products: Option<Vec<String>>,
    pub is_completed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTasksResponse {
    pub date: Date,
    pub week: u8,
    pub day_of_plan: u32,
    pub tasks: Vec<DailyTask>,
    pub completion_rate: u32,
    pub daily_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyScore {
    pub week: u8,
    pub score: u32,
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub critical_tasks_completed: u32,
    pub critical_tasks_total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: Date,
    pub score: u32,
    pub tasks_completed: u32,
    pub tasks_total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressResponse {
    pub current_week: u8,
    pub current_day: u32,
    pub overall_score: u32,
    pub weekly_scores: Vec<WeeklyScore>,
    pub daily_streak: u32,
    pub longest_streak: u32,
    pub total_tasks_completed: u32,
    pub total_tasks_possible: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub plan_start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub plan_end_date: OffsetDateTime,
    pub recent_activity: Vec<DailyActivity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationType {
    TimeAdjusted,
    MadeOptional,
}

impl AdaptationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TimeAdjusted => "time_adjusted",
            Self::MadeOptional => "made_optional",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAdaptationResult {
    pub task_id: String,
    pub adaptation_type: AdaptationType,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_time_of_day: Option<TimeOfDay>,
}

/// A stored task as listed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub week: u8,
    pub generation: u32,
    pub title: String,
    pub description: String,
    pub time_of_day: TimeOfDay,
    pub category: Category,
    pub priority: Priority,
    pub recommended_products: Vec<String>,
    pub user_products: Option<Vec<String>>,
    pub is_active: bool,
    pub skip_count: u32,
    pub last_skipped: Option<Date>,
    pub time_adjusted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            week: task.week,
            generation: task.generation,
            title: task.title.clone(),
            description: task.description.clone(),
            time_of_day: task.time_of_day,
            category: task.category,
            priority: task.priority,
            recommended_products: task.recommended_products.clone(),
            user_products: task.user_products.clone(),
            is_active: task.is_active,
            skip_count: task.adaptations.skip_count,
            last_skipped: task.adaptations.last_skipped,
            time_adjusted: task.adaptations.time_adjusted,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionView {
    pub id: String,
    pub task_id: String,
    pub completed_at: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl From<&TaskCompletion> for CompletionView {
    fn from(completion: &TaskCompletion) -> Self {
        Self {
            id: completion.id.clone(),
            task_id: completion.task_id.clone(),
            completed_at: completion.completed_at,
            recorded_at: completion.timestamp,
        }
    }
}
