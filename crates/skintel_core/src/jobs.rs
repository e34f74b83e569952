//! Recurring sweeps an external scheduler triggers. Each job visits every
//! relevant user; one user's failure is recorded and the sweep moves on.

use crate::engine::TaskEngine;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::LifecycleOutcome;
use crate::model::{PlanType, TaskAdaptationResult};
use crate::storage::Store;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use time::Date;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Job {
    /// Daily: renew stale plan periods for subscribed users.
    RegeneratePlans,
    /// Daily: relax schedules of tasks nobody has been doing.
    AdaptTasks,
    /// End of day: digest of each active user's daily score.
    TrackDailyCompletions,
}

impl Job {
    pub const ALL: [Job; 3] = [
        Job::RegeneratePlans,
        Job::AdaptTasks,
        Job::TrackDailyCompletions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegeneratePlans => "regenerate-plans",
            Self::AdaptTasks => "adapt-tasks",
            Self::TrackDailyCompletions => "track-daily-completions",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Job {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Job::ALL
            .into_iter()
            .find(|job| job.as_str() == normalized)
            .ok_or_else(|| {
                EngineError::invalid_input(format!(
                    "unknown job '{value}' (expected one of: regenerate-plans, adapt-tasks, track-daily-completions)"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDigest {
    pub user_id: String,
    pub date: Date,
    pub daily_score: u32,
    pub completion_rate: u32,
    pub completed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum JobResult {
    Lifecycle {
        user_id: String,
        plan_type: PlanType,
        outcome: LifecycleOutcome,
    },
    Adapted {
        user_id: String,
        adaptations: Vec<TaskAdaptationResult>,
    },
    Daily(DailyDigest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub user_id: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: Job,
    pub results: Vec<JobResult>,
    pub failures: Vec<JobFailure>,
}

impl JobReport {
    fn new(job: Job) -> Self {
        Self {
            job,
            results: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, user_id: String, err: &EngineError) {
        warn!(job = self.job.as_str(), user_id = %user_id, error = %err, "job step failed");
        self.failures.push(JobFailure {
            user_id,
            code: err.code().to_string(),
            message: err.message().to_string(),
        });
    }
}

impl<S: Store> TaskEngine<S> {
    pub fn run_job(&self, job: Job) -> EngineResult<JobReport> {
        let mut report = JobReport::new(job);
        match job {
            Job::RegeneratePlans => self.regenerate_plans(&mut report)?,
            Job::AdaptTasks => self.adapt_all_tasks(&mut report)?,
            Job::TrackDailyCompletions => self.track_daily_completions(&mut report)?,
        }

        info!(
            job = job.as_str(),
            results = report.results.len(),
            failures = report.failures.len(),
            "job finished"
        );
        Ok(report)
    }

    fn regenerate_plans(&self, report: &mut JobReport) -> EngineResult<()> {
        let subscribed: Vec<(String, PlanType)> = self.store().read(|state| {
            state
                .profiles
                .iter()
                .filter_map(|(user_id, profile)| {
                    profile
                        .subscription
                        .as_ref()
                        .map(|subscription| (user_id.clone(), subscription.plan_type))
                })
                .collect()
        })?;

        for (user_id, plan_type) in subscribed {
            match self.ensure_tasks_for_plan_type(&user_id, plan_type) {
                Ok(outcome) => report.results.push(JobResult::Lifecycle {
                    user_id,
                    plan_type,
                    outcome,
                }),
                Err(err) => report.record_failure(user_id, &err),
            }
        }
        Ok(())
    }

    fn adapt_all_tasks(&self, report: &mut JobReport) -> EngineResult<()> {
        let users = self
            .store()
            .read(|state| state.users_with_active_generation())?;

        for user_id in users {
            match self.adapt_tasks_for_user(&user_id) {
                Ok(adaptations) => report.results.push(JobResult::Adapted {
                    user_id,
                    adaptations,
                }),
                Err(err) => report.record_failure(user_id, &err),
            }
        }
        Ok(())
    }

    fn track_daily_completions(&self, report: &mut JobReport) -> EngineResult<()> {
        let users: Vec<String> = self
            .store()
            .read(|state| state.profiles.keys().cloned().collect())?;

        for user_id in users {
            match self.get_todays_tasks(&user_id) {
                Ok(today) => {
                    let completed = today.tasks.iter().filter(|task| task.is_completed).count();
                    report.results.push(JobResult::Daily(DailyDigest {
                        user_id,
                        date: today.date,
                        daily_score: today.daily_score,
                        completion_rate: today.completion_rate,
                        completed: completed as u32,
                        total: today.tasks.len() as u32,
                    }));
                }
                Err(err) if err.is_plan_unavailable() => {
                    debug!(user_id = %user_id, "no active plan, skipping daily digest");
                }
                Err(err) => report.record_failure(user_id, &err),
            }
        }
        Ok(())
    }
}
