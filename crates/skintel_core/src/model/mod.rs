mod completion;
mod plan;
mod response;
mod task;

pub use completion::TaskCompletion;
pub use plan::{
    PlanPeriod, PlanType, Product, ProfileUpdate, Subscription, UserProfile, WeeklyPlanEntry,
};
pub use response::{
    AdaptationType, CompletionView, DailyActivity, DailyTask, DailyTasksResponse,
    TaskAdaptationResult, TaskProgressResponse, TaskView, WeeklyScore,
};
pub use task::{Adaptations, Category, Priority, Task, TimeOfDay, schedule_order};

#[cfg(test)]
pub(crate) use task::fixtures;
