use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// One ledger row. `completed_at` is the calendar day that forms the
/// idempotency key together with the task and user; `timestamp` is when the
/// completion was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub completed_at: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl TaskCompletion {
    pub fn matches(&self, task_id: &str, user_id: &str, day: Date) -> bool {
        self.task_id == task_id && self.user_id == user_id && self.completed_at == day
    }
}
