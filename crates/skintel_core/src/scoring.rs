//! Adherence scoring over the active task generation.
//!
//! Every window here is counted in calendar days relative to the plan's
//! start day. Completions are counted as distinct (task, day) pairs so a
//! ledger that somehow held duplicates could never push a score past 100.

use crate::catalog::active_tasks_for_week;
use crate::clock::days_between;
use crate::engine::{TaskEngine, require_id};
use crate::error::{EngineError, EngineResult};
use crate::model::{
    DailyActivity, DailyTask, DailyTasksResponse, Priority, Task, TaskProgressResponse,
    WeeklyScore,
};
use crate::storage::{EngineState, Store};
use std::collections::HashSet;
use time::{Date, Duration};

pub const PLAN_WEEKS: u8 = 4;
pub const DAYS_PER_WEEK: i64 = 7;
pub const PLAN_DAYS: i64 = PLAN_WEEKS as i64 * DAYS_PER_WEEK;
pub const ROLLING_WINDOW_DAYS: i64 = 7;
pub const STREAK_THRESHOLD: f64 = 80.0;

impl<S: Store> TaskEngine<S> {
    pub fn get_todays_tasks(&self, user_id: &str) -> EngineResult<DailyTasksResponse> {
        let user_id = require_id(user_id, "user id")?;
        let now = self.now();
        let today = self.day_of(now);

        self.store().read(|state| {
            let plan = state
                .profile(user_id)
                .map(|profile| profile.plan)
                .unwrap_or_default();
            let (start, end) = plan
                .bounds()
                .ok_or_else(|| EngineError::no_active_plan("no plan period for user"))?;
            if end <= now {
                return Err(EngineError::no_active_plan("plan period has ended"));
            }

            let days_since_start = days_between(self.day_of(start), today);
            let week = plan_week(days_since_start);
            let tasks: Vec<DailyTask> = active_tasks_for_week(state, user_id, week)
                .into_iter()
                .map(|task| {
                    let completion = state.completion(&task.id, user_id, today);
                    DailyTask {
                        is_completed: completion.is_some(),
                        completed_at: completion.map(|completion| completion.timestamp),
                        id: task.id,
                        title: task.title,
                        description: task.description,
                        time_of_day: task.time_of_day,
                        category: task.category,
                        priority: task.priority,
                        recommended_products: task.recommended_products,
                        user_products: task.user_products,
                    }
                })
                .collect();

            let completed = tasks.iter().filter(|task| task.is_completed).count();
            Ok(DailyTasksResponse {
                date: today,
                week,
                day_of_plan: plan_day(days_since_start),
                completion_rate: percent(completed, tasks.len()),
                daily_score: weighted_daily_score(
                    tasks.iter().map(|task| (task.priority, task.is_completed)),
                ),
                tasks,
            })
        })?
    }

    pub fn get_task_progress(&self, user_id: &str) -> EngineResult<TaskProgressResponse> {
        let user_id = require_id(user_id, "user id")?;
        let today = self.today();

        self.store().read(|state| {
            let plan = state
                .profile(user_id)
                .map(|profile| profile.plan)
                .unwrap_or_default();
            let (start, end) = plan
                .bounds()
                .ok_or_else(|| EngineError::no_plan_found("plan dates are not set"))?;
            let start_day = self.day_of(start);
            let days_since_start = days_between(start_day, today);

            let active: Vec<&Task> = state.active_tasks(user_id).collect();
            let completed = unique_completions(state, user_id, &active, start_day, today);

            let weekly_scores = (1..=PLAN_WEEKS)
                .map(|week| weekly_score(week, &active, &completed, start_day, today))
                .collect();

            let recent_activity = recent_activity(&active, &completed, start_day, today);
            let counted: Vec<bool> = recent_activity
                .iter()
                .map(|day| counts_toward_streak(day_score(day.tasks_completed, day.tasks_total)))
                .collect();
            let (daily_streak, longest_streak) = streaks(&counted);

            let days_elapsed = (days_since_start + 1).clamp(0, PLAN_DAYS);
            let total_possible = active.len() as u64 * days_elapsed as u64;

            Ok(TaskProgressResponse {
                current_week: plan_week(days_since_start),
                current_day: plan_day(days_since_start),
                overall_score: percent(completed.len(), total_possible as usize),
                weekly_scores,
                daily_streak,
                longest_streak,
                total_tasks_completed: completed.len() as u32,
                total_tasks_possible: total_possible as u32,
                plan_start_date: start,
                plan_end_date: end,
                recent_activity,
            })
        })?
    }
}

/// `min(floor(days / 7) + 1, 4)`, never below week 1.
pub fn plan_week(days_since_start: i64) -> u8 {
    (days_since_start.div_euclid(DAYS_PER_WEEK) + 1).clamp(1, PLAN_WEEKS as i64) as u8
}

fn plan_day(days_since_start: i64) -> u32 {
    (days_since_start + 1).max(1) as u32
}

/// `round(100 × Σ(weight × completed) / Σ weight)`, 0 with no tasks.
pub fn weighted_daily_score(tasks: impl IntoIterator<Item = (Priority, bool)>) -> u32 {
    let (earned, possible) = tasks
        .into_iter()
        .fold((0u32, 0u32), |(earned, possible), (priority, completed)| {
            let weight = priority.weight();
            (earned + if completed { weight } else { 0 }, possible + weight)
        });
    percent(earned as usize, possible as usize)
}

pub fn percent(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        return 0;
    }
    (100.0 * numerator as f64 / denominator as f64).round() as u32
}

fn day_score(completed: u32, scheduled: u32) -> f64 {
    if scheduled == 0 {
        return 0.0;
    }
    100.0 * completed as f64 / scheduled as f64
}

pub fn counts_toward_streak(score: f64) -> bool {
    score >= STREAK_THRESHOLD
}

/// Returns (run ending at the last day, longest run anywhere).
pub fn streaks(counted: &[bool]) -> (u32, u32) {
    let mut longest = 0;
    let mut run = 0;
    for counts in counted {
        if *counts {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    (run, longest)
}

/// Distinct (task, day) completions of active tasks between the plan start
/// day and today.
fn unique_completions<'a>(
    state: &'a EngineState,
    user_id: &'a str,
    active: &[&Task],
    start_day: Date,
    today: Date,
) -> HashSet<(&'a str, Date)> {
    let active_ids: HashSet<&str> = active.iter().map(|task| task.id.as_str()).collect();
    state
        .completions_for_user(user_id)
        .filter(|completion| active_ids.contains(completion.task_id.as_str()))
        .filter(|completion| (start_day..=today).contains(&completion.completed_at))
        .map(|completion| (completion.task_id.as_str(), completion.completed_at))
        .collect()
}

fn week_start(start_day: Date, week: u8) -> Date {
    start_day + Duration::days(DAYS_PER_WEEK * (week as i64 - 1))
}

fn weekly_score(
    week: u8,
    active: &[&Task],
    completed: &HashSet<(&str, Date)>,
    start_day: Date,
    today: Date,
) -> WeeklyScore {
    let first_day = week_start(start_day, week);
    let days_passed = (days_between(first_day, today) + 1).clamp(0, DAYS_PER_WEEK) as u32;
    let last_day = first_day + Duration::days(DAYS_PER_WEEK - 1);

    let week_tasks: Vec<&&Task> = active.iter().filter(|task| task.week == week).collect();
    let count_completed = |critical_only: bool| {
        let ids: HashSet<&str> = week_tasks
            .iter()
            .filter(|task| !critical_only || task.priority == Priority::Critical)
            .map(|task| task.id.as_str())
            .collect();
        completed
            .iter()
            .filter(|(task_id, day)| ids.contains(task_id) && (first_day..=last_day).contains(day))
            .count() as u32
    };

    let critical_count = week_tasks
        .iter()
        .filter(|task| task.priority == Priority::Critical)
        .count() as u32;
    let completed_tasks = count_completed(false);
    let total_tasks = week_tasks.len() as u32 * days_passed;

    WeeklyScore {
        week,
        score: percent(completed_tasks as usize, total_tasks as usize),
        completed_tasks,
        total_tasks,
        critical_tasks_completed: count_completed(true),
        critical_tasks_total: critical_count * days_passed,
    }
}

/// The seven days ending today, oldest first. A day outside the plan has no
/// scheduled tasks.
fn recent_activity(
    active: &[&Task],
    completed: &HashSet<(&str, Date)>,
    start_day: Date,
    today: Date,
) -> Vec<DailyActivity> {
    (0..ROLLING_WINDOW_DAYS)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            let index = days_between(start_day, day);
            let scheduled: Vec<&&Task> = if (0..PLAN_DAYS).contains(&index) {
                let week = plan_week(index);
                active.iter().filter(|task| task.week == week).collect()
            } else {
                Vec::new()
            };
            let tasks_completed = scheduled
                .iter()
                .filter(|task| completed.contains(&(task.id.as_str(), day)))
                .count() as u32;
            let tasks_total = scheduled.len() as u32;

            DailyActivity {
                date: day,
                score: day_score(tasks_completed, tasks_total).round() as u32,
                tasks_completed,
                tasks_total,
            }
        })
        .collect()
}
