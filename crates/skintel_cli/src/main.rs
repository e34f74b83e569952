use clap::Parser;
use serde::Serialize;
use skintel_cli::cli::{Cli, Command, ConfigOverrideTarget, parse_config_override};
use skintel_core::catalog::GenerationOutcome;
use skintel_core::config::{Config, ConfigOverrides, load_config_with_fallback, merge_overrides};
use skintel_core::error::EngineError;
use skintel_core::jobs::{Job, JobReport, JobResult};
use skintel_core::lifecycle::LifecycleOutcome;
use skintel_core::model::{
    CompletionView, DailyTasksResponse, PlanType, ProfileUpdate, Task, TaskAdaptationResult,
    TaskCompletion, TaskProgressResponse, TaskView,
};
use skintel_core::planner::planner_from_env;
use skintel_core::storage::JsonStore;
use skintel_core::TaskEngine;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Week")]
    week: u8,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "When")]
    time_of_day: &'static str,
    #[tabled(rename = "Priority")]
    priority: &'static str,
    #[tabled(rename = "Category")]
    category: &'static str,
    #[tabled(rename = "Products")]
    products: String,
}

#[derive(Tabled)]
struct TodayRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "When")]
    time_of_day: &'static str,
    #[tabled(rename = "Priority")]
    priority: &'static str,
    #[tabled(rename = "Done")]
    done: &'static str,
}

#[derive(Tabled)]
struct WeekRow {
    #[tabled(rename = "Week")]
    week: u8,
    #[tabled(rename = "Score")]
    score: u32,
    #[tabled(rename = "Completed")]
    completed: String,
    #[tabled(rename = "Critical")]
    critical: String,
}

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Date")]
    date: Date,
    #[tabled(rename = "Score")]
    score: u32,
    #[tabled(rename = "Completed")]
    completed: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Day")]
    day: Date,
    #[tabled(rename = "Recorded at")]
    recorded_at: String,
}

#[derive(Tabled)]
struct AdaptationRow {
    #[tabled(rename = "Task")]
    task_id: String,
    #[tabled(rename = "Change")]
    change: &'static str,
    #[tabled(rename = "Reason")]
    reason: String,
}

fn render<R: Tabled>(rows: impl IntoIterator<Item = R>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn timestamp(instant: OffsetDateTime) -> String {
    instant
        .format(&Rfc3339)
        .unwrap_or_else(|_| instant.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), EngineError> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn task_row(task: &Task) -> TaskRow {
    TaskRow {
        id: task.id.clone(),
        week: task.week,
        title: task.title.clone(),
        time_of_day: task.time_of_day.as_str(),
        priority: task.priority.as_str(),
        category: task.category.as_str(),
        products: task
            .user_products
            .as_ref()
            .map(|ids| ids.join(", "))
            .unwrap_or_else(|| "-".to_string()),
    }
}

fn print_today(today: &DailyTasksResponse) {
    println!(
        "{} | week {} | day {}",
        today.date, today.week, today.day_of_plan
    );
    if today.tasks.is_empty() {
        println!("No tasks for this week.");
    } else {
        println!(
            "{}",
            render(today.tasks.iter().map(|task| TodayRow {
                id: task.id.clone(),
                title: task.title.clone(),
                time_of_day: task.time_of_day.as_str(),
                priority: task.priority.as_str(),
                done: if task.is_completed { "yes" } else { "-" },
            }))
        );
    }
    println!(
        "Daily score: {} | Completion: {}%",
        today.daily_score, today.completion_rate
    );
}

fn print_progress(progress: &TaskProgressResponse) {
    println!(
        "Week {} | day {} | overall {} ({}/{})",
        progress.current_week,
        progress.current_day,
        progress.overall_score,
        progress.total_tasks_completed,
        progress.total_tasks_possible
    );
    println!(
        "Plan: {} -> {}",
        timestamp(progress.plan_start_date),
        timestamp(progress.plan_end_date)
    );
    println!(
        "{}",
        render(progress.weekly_scores.iter().map(|week| WeekRow {
            week: week.week,
            score: week.score,
            completed: format!("{}/{}", week.completed_tasks, week.total_tasks),
            critical: format!(
                "{}/{}",
                week.critical_tasks_completed, week.critical_tasks_total
            ),
        }))
    );
    println!(
        "{}",
        render(progress.recent_activity.iter().map(|day| ActivityRow {
            date: day.date,
            score: day.score,
            completed: format!("{}/{}", day.tasks_completed, day.tasks_total),
        }))
    );
    println!(
        "Streak: {} days (longest {})",
        progress.daily_streak, progress.longest_streak
    );
}

fn print_adaptations(adaptations: &[TaskAdaptationResult]) {
    if adaptations.is_empty() {
        println!("No tasks needed adapting.");
        return;
    }
    println!(
        "{}",
        render(adaptations.iter().map(|adaptation| AdaptationRow {
            task_id: adaptation.task_id.clone(),
            change: adaptation.adaptation_type.as_str(),
            reason: adaptation.reason.clone(),
        }))
    );
}

fn describe_generation(outcome: GenerationOutcome) -> String {
    match outcome {
        GenerationOutcome::Skipped => "Active tasks already exist, nothing generated".to_string(),
        GenerationOutcome::Created {
            generation,
            task_count,
        } => format!("Generated {task_count} tasks (generation {generation})"),
    }
}

fn describe_lifecycle(outcome: &LifecycleOutcome) -> String {
    match outcome {
        LifecycleOutcome::Current => "Plan is current".to_string(),
        LifecycleOutcome::Generated { generation } => {
            format!("Generated missing tasks (generation {generation})")
        }
        LifecycleOutcome::Regenerated { generation, plan } => {
            let ends = plan
                .plan_end_date
                .map(timestamp)
                .unwrap_or_else(|| "-".to_string());
            format!("Renewed plan until {ends} (generation {generation})")
        }
        LifecycleOutcome::RolledBack { reason } => {
            format!("Renewal failed, previous plan kept: {reason}")
        }
        LifecycleOutcome::GenerationDeferred { reason } => {
            format!("Generation deferred: {reason}")
        }
    }
}

fn print_job_report(report: &JobReport) {
    println!(
        "Job {}: {} users processed, {} failed",
        report.job,
        report.results.len(),
        report.failures.len()
    );
    for result in &report.results {
        match result {
            JobResult::Lifecycle {
                user_id, outcome, ..
            } => println!("{user_id}: {}", describe_lifecycle(outcome)),
            JobResult::Adapted {
                user_id,
                adaptations,
            } => println!("{user_id}: {} tasks adapted", adaptations.len()),
            JobResult::Daily(digest) => println!(
                "{}: {} score {} ({}/{} done)",
                digest.user_id, digest.date, digest.daily_score, digest.completed, digest.total
            ),
        }
    }
    for failure in &report.failures {
        eprintln!(
            "FAILED {}: {} - {}",
            failure.user_id, failure.code, failure.message
        );
    }
}

fn normalize_parse_error(err: clap::Error) -> EngineError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    EngineError::invalid_input(message)
}

fn parse_day(raw: Option<&str>) -> Result<Option<Date>, EngineError> {
    raw.map(|value| {
        Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
            EngineError::invalid_input(format!("date '{value}' must be YYYY-MM-DD"))
        })
    })
    .transpose()
}

fn resolve_config(cli: &Cli) -> Result<(Config, Option<EngineError>), EngineError> {
    let loaded = load_config_with_fallback();

    let mut overrides = ConfigOverrides::default();
    for raw in &cli.config_override {
        let parsed = parse_config_override(raw).map_err(EngineError::invalid_input)?;
        match parsed.target {
            ConfigOverrideTarget::DayOffset => overrides.day_offset = Some(parsed.value),
            ConfigOverrideTarget::PlannerCommand => overrides.planner_command = Some(parsed.value),
            ConfigOverrideTarget::LogFilter => overrides.log_filter = Some(parsed.value),
        }
    }

    Ok((merge_overrides(&loaded.config, &overrides), loaded.error))
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_engine(config: &Config) -> Result<TaskEngine<JsonStore>, EngineError> {
    let store = JsonStore::open_default()?;
    debug!(path = %store.path().display(), "opened store");
    let planner = planner_from_env(config.planner_command.as_deref())?;
    Ok(TaskEngine::new(store, planner).with_day_offset(config.day_offset()?))
}

fn subscription_plan_type(
    engine: &TaskEngine<JsonStore>,
    user: &str,
) -> Result<PlanType, EngineError> {
    engine
        .profile(user)?
        .and_then(|profile| profile.subscription)
        .map(|subscription| subscription.plan_type)
        .ok_or_else(|| {
            EngineError::invalid_input(format!(
                "user {user} has no subscription; pass --plan-type"
            ))
        })
}

fn run_command(cli: Cli, engine: &TaskEngine<JsonStore>) -> Result<(), EngineError> {
    match cli.command {
        Command::Today { user } => {
            let today = engine.get_todays_tasks(&user)?;
            if cli.json {
                print_json(&today)?;
            } else {
                print_today(&today);
            }
        }
        Command::Progress { user } => {
            let progress = engine.get_task_progress(&user)?;
            if cli.json {
                print_json(&progress)?;
            } else {
                print_progress(&progress);
            }
        }
        Command::Tasks { user, week } => {
            let tasks = match week {
                Some(week) => engine.tasks_for_week(&user, week)?,
                None => engine.active_tasks(&user)?,
            };
            if cli.json {
                let views: Vec<TaskView> = tasks.iter().map(TaskView::from).collect();
                print_json(&views)?;
            } else if tasks.is_empty() {
                println!("No active tasks.");
            } else {
                println!("{}", render(tasks.iter().map(task_row)));
            }
        }
        Command::Complete { user, task, date } => {
            let day = parse_day(date.as_deref())?;
            let recorded = engine.complete_task(&user, &task, day)?;
            if cli.json {
                print_json(&serde_json::json!({ "taskId": task, "completed": recorded }))?;
            } else if recorded {
                println!("Completed task {task}");
            } else {
                println!("Task {task} was already completed for that day");
            }
        }
        Command::Uncomplete { user, task, date } => {
            let day = parse_day(date.as_deref())?;
            let removed = engine.uncomplete_task(&user, &task, day)?;
            if cli.json {
                print_json(&serde_json::json!({ "taskId": task, "removed": removed }))?;
            } else if removed {
                println!("Removed completion for task {task}");
            } else {
                println!("Task {task} was not completed for that day");
            }
        }
        Command::History { user, task } => {
            let history: Vec<TaskCompletion> = engine.completions_for_task(&user, &task)?;
            if cli.json {
                let views: Vec<CompletionView> = history.iter().map(CompletionView::from).collect();
                print_json(&views)?;
            } else if history.is_empty() {
                println!("No completions recorded.");
            } else {
                println!(
                    "{}",
                    render(history.iter().map(|completion| HistoryRow {
                        day: completion.completed_at,
                        recorded_at: timestamp(completion.timestamp),
                    }))
                );
            }
        }
        Command::Generate { user, force } => {
            let outcome = engine.generate_from_profile(&user, force)?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!("{}", describe_generation(outcome));
            }
        }
        Command::Adapt { user } => {
            let adaptations = engine.adapt_tasks_for_user(&user)?;
            if cli.json {
                print_json(&adaptations)?;
            } else {
                print_adaptations(&adaptations);
            }
        }
        Command::Ensure { user, plan_type } => {
            let plan_type = match plan_type {
                Some(plan_type) => plan_type.into(),
                None => subscription_plan_type(engine, &user)?,
            };
            let outcome = engine.ensure_tasks_for_plan_type(&user, plan_type)?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!("{}", describe_lifecycle(&outcome));
            }
        }
        Command::Sync { user, file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|err| EngineError::io(format!("{}: {}", file.display(), err)))?;
            let update: ProfileUpdate = serde_json::from_str(&content).map_err(|err| {
                EngineError::invalid_data(format!("invalid JSON in {}: {}", file.display(), err))
            })?;
            let profile = engine.sync_profile(&user, update)?;
            if cli.json {
                print_json(&profile)?;
            } else {
                println!(
                    "Synced profile for {user}: {} plan weeks, {} products",
                    profile.weekly_plan.len(),
                    profile.products.len()
                );
            }
        }
        Command::Run { job } => {
            let job: Job = job.parse()?;
            let report = engine.run_job(job)?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_job_report(&report);
            }
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), EngineError> {
    let (config, config_error) = resolve_config(&cli)?;
    init_logging(&config);
    if let Some(err) = config_error {
        warn!(error = %err, "config file ignored, using defaults");
    }

    let engine = build_engine(&config)?;
    run_command(cli, &engine)
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            print!("{err}");
            return;
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
